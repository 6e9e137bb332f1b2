use crate::script::ScriptError;
use std::{fmt::Display, io};

#[derive(Debug)]
pub enum Error {
    MalformedFixture(String),
    FixtureNotFound { path: String, source: io::Error },
    MalformedScenarioFile(String),
    UnsupportedMethod(String),
    UnresolvedStep(String),
    AssertionFailed(String),
    UnsatisfiedInterceptor(String),
    ScriptNotRegistered(String),
    ScaffoldTargetExists(String),
    Script(ScriptError),
    ParseUriError(String),
    IoError(io::Error),
    YamlError(serde_yaml::Error),
}

impl std::error::Error for Error {}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::MalformedFixture(message) => {
                write!(f, "Malformed fixture: {}", message)
            }
            Error::FixtureNotFound { path, source } => {
                write!(f, "Fixture not found at {}: {}", path, source)
            }
            Error::MalformedScenarioFile(message) => {
                write!(f, "Malformed scenario file: {}", message)
            }
            Error::UnsupportedMethod(method) => {
                write!(f, "Unsupported HTTP method: {}", method)
            }
            Error::UnresolvedStep(message) => write!(f, "Unresolved step: {}", message),
            Error::AssertionFailed(message) => write!(f, "Assertion failed: {}", message),
            Error::UnsatisfiedInterceptor(message) => {
                write!(f, "Expected request was never made: {}", message)
            }
            Error::ScriptNotRegistered(name) => {
                write!(f, "No script registered under the name '{}'", name)
            }
            Error::ScaffoldTargetExists(path) => {
                write!(f, "Refusing to overwrite existing file {}", path)
            }
            Error::Script(e) => write!(f, "Script error: {}", e),
            Error::ParseUriError(url) => write!(f, "Couldn't parse the URL '{}'", url),
            Error::IoError(e) => write!(f, "IoError: {}", e),
            Error::YamlError(e) => write!(f, "YAML error: {}", e),
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::IoError(e)
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::YamlError(e)
    }
}

impl From<ScriptError> for Error {
    fn from(e: ScriptError) -> Self {
        Error::Script(e)
    }
}
