//! The built-in library of common-error scenarios, synthesized from one
//! template request.

use crate::data::{Expectation, RequestSpec, ResponseData, Scenario, Step};
use serde_json::Map;
use std::collections::{HashMap, HashSet};

struct CommonTemplate {
    name: &'static str,
    /// `None` marks the connection-level failure template.
    status: Option<u16>,
    body: &'static str,
}

const COMMON_TEMPLATES: &[CommonTemplate] = &[
    CommonTemplate {
        name: "401 unauthorized",
        status: Some(401),
        body: r#"{"error":"Unauthorized"}"#,
    },
    CommonTemplate {
        name: "403 forbidden",
        status: Some(403),
        body: r#"{"error":"Forbidden"}"#,
    },
    CommonTemplate {
        name: "429 rate limited",
        status: Some(429),
        body: r#"{"error":"rate limit exceeded"}"#,
    },
    CommonTemplate {
        name: "500 internal server error",
        status: Some(500),
        body: r#"{"error":"Internal Server Error"}"#,
    },
    CommonTemplate {
        name: "502 bad gateway",
        status: Some(502),
        body: r#"{"error":"Bad Gateway"}"#,
    },
    CommonTemplate {
        name: "503 service unavailable",
        status: Some(503),
        body: r#"{"error":"Service Unavailable"}"#,
    },
    CommonTemplate {
        name: "504 gateway timeout",
        status: Some(504),
        body: r#"{"error":"Gateway Timeout"}"#,
    },
    CommonTemplate {
        name: "network connection error",
        status: None,
        body: "",
    },
];

pub fn template_names() -> Vec<&'static str> {
    COMMON_TEMPLATES.iter().map(|t| t.name).collect()
}

/// Builds one scenario per template whose name is not already taken by a
/// user-defined scenario, in template-declaration order. Every synthesized
/// scenario expects the script to throw (any message) when the request
/// fails.
pub fn synthesize(template_request: &RequestSpec, taken_names: &HashSet<String>) -> Vec<Scenario> {
    COMMON_TEMPLATES
        .iter()
        .filter(|template| !taken_names.contains(template.name))
        .map(|template| build(template, template_request))
        .collect()
}

fn build(template: &CommonTemplate, request: &RequestSpec) -> Scenario {
    let step = match template.status {
        Some(status_code) => {
            let mut headers = HashMap::new();
            headers.insert(
                String::from("Content-Type"),
                String::from("application/json"),
            );
            Step {
                request: request.clone(),
                fixture_path: None,
                fixture: Some(ResponseData {
                    status_code,
                    headers,
                    body: template.body.to_string(),
                }),
                network_error: false,
            }
        }
        None => Step {
            request: request.clone(),
            fixture_path: None,
            fixture: None,
            network_error: true,
        },
    };

    Scenario {
        name: template.name.to_string(),
        steps: vec![step],
        params: Map::new(),
        secrets: HashMap::new(),
        environment: HashMap::new(),
        invoke: Expectation::Throws(String::new()),
        error: None,
        common: true,
    }
}
