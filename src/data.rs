use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::PathBuf;

/// One outbound HTTP call as seen by the transport layer.
#[derive(Debug, Clone)]
pub struct RequestData {
    pub method: String,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl RequestData {
    pub fn new<M: Into<String>, U: Into<String>>(method: M, url: U) -> Self {
        RequestData {
            method: method.into(),
            url: url.into(),
            headers: HashMap::new(),
            body: String::new(),
        }
    }
}

/// A canned HTTP response. Parsed fixtures and transport replies share this
/// shape.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseData {
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

/// One expected outbound request. Matching is method + origin + path&query,
/// plus the listed headers when any are given; a request carrying extra
/// headers still matches.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestSpec {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
}

/// One expected request and its canned answer within a scenario. Exactly one
/// of `fixture_path`, `fixture` or `network_error` must be resolved before
/// the step executes; `fixture_path` is read lazily relative to the scenario
/// file's directory.
#[derive(Debug, Clone)]
pub struct Step {
    pub request: RequestSpec,
    pub fixture_path: Option<String>,
    pub fixture: Option<ResponseData>,
    pub network_error: bool,
}

/// What a script call is expected to do. The two cases are mutually
/// exclusive: either every listed key of the result must equal the expected
/// value, or the call must throw with a message containing the substring
/// (an empty substring matches any thrown error).
#[derive(Debug, Clone)]
pub enum Expectation {
    Returns(Map<String, Value>),
    Throws(String),
}

/// One named, independently executed test case.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: String,
    pub steps: Vec<Step>,
    pub params: Map<String, Value>,
    pub secrets: HashMap<String, String>,
    pub environment: HashMap<String, String>,
    pub invoke: Expectation,
    /// Expectation for the secondary error-handling capability. Absent means
    /// the handler is not invoked at all.
    pub error: Option<Expectation>,
    /// Set on scenarios synthesized from the built-in common templates.
    pub common: bool,
}

/// The `action` section of a scenario file: the base configuration layer
/// every scenario inherits from. Also the shape of the merged effective
/// configuration.
#[derive(Debug, Clone, Default)]
pub struct ActionDefaults {
    pub params: Map<String, Value>,
    pub secrets: HashMap<String, String>,
    pub environment: HashMap<String, String>,
}

/// A fully parsed scenario file.
#[derive(Debug, Clone)]
pub struct ScenarioSet {
    pub action: ActionDefaults,
    pub scenarios: Vec<Scenario>,
    /// The resolved file path when the set was read from disk.
    pub path: Option<PathBuf>,
}
