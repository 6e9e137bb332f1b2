//! A declarative test harness: scenarios described in YAML replay canned
//! HTTP fixtures against an action module and assert its invoke/error
//! behavior.

mod assert;
pub mod common;
mod data;
mod error;
pub mod fixture;
mod http_client;
mod interceptor;
mod runner;
pub mod scaffold;
pub mod scenario;
mod script;

pub use assert::assert_scenario;
pub use data::{
    ActionDefaults, Expectation, RequestData, RequestSpec, ResponseData, Scenario, ScenarioSet,
    Step,
};
pub use error::Error;
pub use http_client::{HttpClient, HyperHttpClient, TransportError};
pub use interceptor::{InterceptionGuard, InterceptorHandle, MockTransport, SUPPORTED_METHODS};
pub use runner::{run, run_blocking, RunConfiguration, RunReport, ScenarioOutcome};
pub use scenario::{merge_defaults, ParseOptions};
pub use script::{
    register_script, ActionScript, Context, DiagnosticSink, Params, ScriptError, ScriptSource,
    StderrSink,
};
