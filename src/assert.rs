//! The two-phase invoke/error assertion engine.

use crate::data::{Expectation, Scenario};
use crate::error::Error;
use crate::script::{ActionScript, Context, Params};
use serde_json::{json, Map, Value};

/// Drives one scenario's call sequence against the script and raises
/// `AssertionFailed` on the first mismatch.
///
/// Phase 1 calls `invoke`. A `returns` expectation requires the call to
/// resolve and every expected key to equal the actual value (extra actual
/// keys are ignored). A `throws` expectation requires the call to fail with
/// a message containing the expected substring; the empty substring matches
/// any error. Phase 2 runs only after a caught throw, and only when the
/// scenario has an `error` expectation and the script exposes the error
/// capability: the handler is called with the caught error attached to the
/// params under `error`, and its outcome is matched by the same rules.
pub async fn assert_scenario(
    script: &dyn ActionScript,
    params: &Params,
    context: &Context,
    scenario: &Scenario,
) -> Result<(), Error> {
    let caught = match &scenario.invoke {
        Expectation::Returns(expected) => {
            let actual = script.invoke(params, context).await.map_err(|e| {
                Error::AssertionFailed(format!("expected invoke to return, but it threw: {}", e))
            })?;
            return assert_returns("invoke", expected, &actual);
        }
        Expectation::Throws(substring) => {
            let caught = match script.invoke(params, context).await {
                Ok(_) => {
                    return Err(Error::AssertionFailed(String::from(
                        "expected invoke to throw",
                    )))
                }
                Err(error) => error,
            };
            assert_message("invoke", substring, caught.message())?;
            caught
        }
    };

    let error_expectation = match &scenario.error {
        Some(expectation) => expectation,
        // no error section: the caller's own retry policy takes over
        None => return Ok(()),
    };
    if !script.has_error_capability() {
        return Ok(());
    }

    let mut error_params = params.clone();
    error_params.insert(
        String::from("error"),
        json!({ "message": caught.message() }),
    );

    match error_expectation {
        Expectation::Returns(expected) => {
            let actual = script.error(&error_params, context).await.map_err(|e| {
                Error::AssertionFailed(format!(
                    "expected error handler to return, but it threw: {}",
                    e
                ))
            })?;
            assert_returns("error handler", expected, &actual)
        }
        Expectation::Throws(substring) => match script.error(&error_params, context).await {
            Ok(_) => Err(Error::AssertionFailed(String::from(
                "Expected error handler to throw",
            ))),
            Err(error) => assert_message("error handler", substring, error.message()),
        },
    }
}

fn assert_returns(phase: &str, expected: &Map<String, Value>, actual: &Value) -> Result<(), Error> {
    for (key, expected_value) in expected {
        let actual_value = actual.get(key).unwrap_or(&Value::Null);
        if actual_value != expected_value {
            return Err(Error::AssertionFailed(format!(
                "{} result mismatch at '{}': expected {}, got {}",
                phase, key, expected_value, actual_value
            )));
        }
    }
    Ok(())
}

fn assert_message(phase: &str, expected: &str, actual: &str) -> Result<(), Error> {
    if expected.is_empty() || actual.contains(expected) {
        Ok(())
    } else {
        Err(Error::AssertionFailed(format!(
            "{} threw \"{}\", expected the message to contain \"{}\"",
            phase, actual, expected
        )))
    }
}
