//! The contract of the action module under test and how the harness gets
//! hold of one.

use crate::error::Error;
use crate::http_client::HttpClient;
use async_trait::async_trait;
use lazy_static::lazy_static;
use serde_json::{Map, Value};
use std::{
    collections::HashMap,
    fmt::{self, Display},
    sync::{Arc, Mutex},
};

pub type Params = Map<String, Value>;

/// An error thrown by the script under test. Never swallowed by the
/// harness; its message is what throw-expectations match against.
#[derive(Debug, Clone)]
pub struct ScriptError {
    message: String,
}

impl ScriptError {
    pub fn new<S: Into<String>>(message: S) -> Self {
        ScriptError {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::error::Error for ScriptError {}

impl Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Where a script's incidental diagnostic output goes. The orchestrator
/// swaps in a suppressed sink for the duration of a scenario.
pub trait DiagnosticSink: Send + Sync {
    fn write(&self, message: &str);
}

pub struct StderrSink;

impl DiagnosticSink for StderrSink {
    fn write(&self, message: &str) {
        eprintln!("{}", message);
    }
}

/// Forwards script output to `log::debug!`, keeping it out of test output
/// unless a logger opts in.
pub(crate) struct QuietSink;

impl DiagnosticSink for QuietSink {
    fn write(&self, message: &str) {
        log::debug!(target: "scenario_harness::script", "{}", message);
    }
}

/// Everything a script call receives besides its params: the merged
/// secrets/environment layers, the HTTP capability it must use for outbound
/// calls (which is how the harness intercepts them), and a diagnostic sink.
#[derive(Clone)]
pub struct Context {
    pub secrets: HashMap<String, String>,
    pub environment: HashMap<String, String>,
    pub http: Arc<dyn HttpClient>,
    pub console: Arc<dyn DiagnosticSink>,
}

impl Context {
    pub fn log(&self, message: &str) {
        self.console.write(message);
    }
}

/// The capability set of an action module: a required `invoke` plus
/// optional `error` and `halt` handlers. A module advertises the optional
/// capabilities through the probe methods; the defaulted bodies throw so a
/// probe/body mismatch surfaces as an ordinary script error.
#[async_trait]
pub trait ActionScript: Send + Sync {
    async fn invoke(&self, params: &Params, context: &Context) -> Result<Value, ScriptError>;

    async fn error(&self, _params: &Params, _context: &Context) -> Result<Value, ScriptError> {
        Err(ScriptError::new("script does not expose an error capability"))
    }

    async fn halt(&self, _params: &Params, _context: &Context) -> Result<Value, ScriptError> {
        Err(ScriptError::new("script does not expose a halt capability"))
    }

    fn has_error_capability(&self) -> bool {
        false
    }

    fn has_halt_capability(&self) -> bool {
        false
    }
}

/// How the orchestrator obtains the script: by name from the process-wide
/// registry (resolved lazily on first use, then cached for the run), or as
/// an already-instantiated module used directly.
#[derive(Clone)]
pub enum ScriptSource {
    Registered(String),
    Instance(Arc<dyn ActionScript>),
}

impl fmt::Debug for ScriptSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptSource::Registered(name) => write!(f, "Registered({})", name),
            ScriptSource::Instance(_) => write!(f, "Instance(<script>)"),
        }
    }
}

lazy_static! {
    static ref SCRIPT_REGISTRY: Mutex<HashMap<String, Arc<dyn ActionScript>>> =
        Mutex::new(HashMap::new());
}

/// Makes a script available to [`ScriptSource::Registered`] lookups.
pub fn register_script<S: Into<String>>(name: S, script: Arc<dyn ActionScript>) {
    SCRIPT_REGISTRY
        .lock()
        .unwrap()
        .insert(name.into(), script);
}

/// Resolves a [`ScriptSource`] once per run and caches the result.
pub(crate) struct ScriptHandle {
    source: ScriptSource,
    cached: Mutex<Option<Arc<dyn ActionScript>>>,
}

impl ScriptHandle {
    pub(crate) fn new(source: ScriptSource) -> Self {
        ScriptHandle {
            source,
            cached: Mutex::new(None),
        }
    }

    pub(crate) fn get(&self) -> Result<Arc<dyn ActionScript>, Error> {
        match &self.source {
            ScriptSource::Instance(script) => Ok(script.clone()),
            ScriptSource::Registered(name) => {
                let mut cached = self.cached.lock().unwrap();
                if let Some(script) = cached.as_ref() {
                    return Ok(script.clone());
                }
                let script = SCRIPT_REGISTRY
                    .lock()
                    .unwrap()
                    .get(name)
                    .cloned()
                    .ok_or_else(|| Error::ScriptNotRegistered(name.clone()))?;
                *cached = Some(script.clone());
                Ok(script)
            }
        }
    }
}
