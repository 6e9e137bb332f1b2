//! Parses scenario files: YAML → [`ScenarioSet`], with shorthand
//! normalization, ordered required-field validation and common-scenario
//! synthesis.

use crate::common;
use crate::data::{ActionDefaults, Expectation, RequestSpec, Scenario, ScenarioSet, Step};
use crate::error::Error;
use serde_json::{Map, Value};
use serde_yaml::Value as Yaml;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Augment the user-defined scenarios with the built-in common-error
    /// library (default true).
    pub include_common: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            include_common: true,
        }
    }
}

/// Parses a scenario document. Validation happens in a fixed order, each
/// failure a `MalformedScenarioFile` naming the missing field: the `action`
/// section, a non-empty `scenarios` sequence, then per scenario `name`,
/// `steps`/`request`, and `invoke`.
pub fn parse(yaml_text: &str, options: &ParseOptions) -> Result<ScenarioSet, Error> {
    let document: Yaml = serde_yaml::from_str(yaml_text)?;

    let action_value = document
        .get("action")
        .ok_or_else(|| malformed("missing required 'action' section"))?;
    let action = parse_action(action_value);

    let scenarios_value = document
        .get("scenarios")
        .ok_or_else(|| malformed("missing required 'scenarios' section"))?;
    let entries = scenarios_value
        .as_sequence()
        .ok_or_else(|| malformed("'scenarios' must be a sequence"))?;
    if entries.is_empty() {
        return Err(malformed("'scenarios' must not be empty"));
    }

    let mut scenarios = Vec::with_capacity(entries.len());
    for entry in entries {
        scenarios.push(parse_scenario(entry)?);
    }

    if options.include_common {
        // The first user scenario's first step is the request template for
        // the whole common library.
        let template_request = scenarios[0].steps[0].request.clone();
        let taken: HashSet<String> = scenarios.iter().map(|s| s.name.clone()).collect();
        scenarios.extend(common::synthesize(&template_request, &taken));
    }

    Ok(ScenarioSet {
        action,
        scenarios,
        path: None,
    })
}

/// Reads and parses a scenario file, recording the path on the result.
pub fn parse_file<P: AsRef<Path>>(path: P, options: &ParseOptions) -> Result<ScenarioSet, Error> {
    let contents = fs::read_to_string(path.as_ref())?;
    let mut set = parse(&contents, options)?;
    set.path = Some(path.as_ref().to_path_buf());
    Ok(set)
}

/// Layers a scenario's overrides on the action defaults: `params`,
/// `secrets` and `environment` override key-for-key, nothing merges deeper.
pub fn merge_defaults(action: &ActionDefaults, scenario: &Scenario) -> ActionDefaults {
    let mut params = action.params.clone();
    for (key, value) in &scenario.params {
        params.insert(key.clone(), value.clone());
    }

    let mut secrets = action.secrets.clone();
    secrets.extend(scenario.secrets.clone());

    let mut environment = action.environment.clone();
    environment.extend(scenario.environment.clone());

    ActionDefaults {
        params,
        secrets,
        environment,
    }
}

fn malformed<S: Into<String>>(message: S) -> Error {
    Error::MalformedScenarioFile(message.into())
}

fn parse_action(value: &Yaml) -> ActionDefaults {
    let params = value
        .get("params")
        .map(yaml_to_json_map)
        .unwrap_or_default();
    let context = value.get("context");
    let secrets = parse_string_map(context.and_then(|c| c.get("secrets")));
    let environment = parse_string_map(context.and_then(|c| c.get("environment")));

    ActionDefaults {
        params,
        secrets,
        environment,
    }
}

fn parse_scenario(entry: &Yaml) -> Result<Scenario, Error> {
    let name = entry
        .get("name")
        .and_then(Yaml::as_str)
        .ok_or_else(|| malformed("scenario is missing 'name'"))?
        .to_string();

    let steps = if let Some(steps_value) = entry.get("steps") {
        let step_entries = steps_value
            .as_sequence()
            .ok_or_else(|| malformed(format!("scenario '{}': 'steps' must be a sequence", name)))?;
        let mut steps = Vec::with_capacity(step_entries.len());
        for step_entry in step_entries {
            steps.push(parse_step(step_entry, &name)?);
        }
        if steps.is_empty() {
            return Err(malformed(format!(
                "scenario '{}': 'steps' must not be empty",
                name
            )));
        }
        steps
    } else if entry.get("request").is_some() {
        // shorthand: request/fixture at the scenario level become a single
        // step, and the shorthand keys disappear from the parsed shape
        vec![parse_step(entry, &name)?]
    } else {
        return Err(malformed(format!(
            "scenario '{}' must declare 'steps' or a 'request'",
            name
        )));
    };

    let invoke_value = entry
        .get("invoke")
        .ok_or_else(|| malformed(format!("scenario '{}' is missing 'invoke'", name)))?;
    let invoke = parse_expectation(invoke_value, &name, "invoke")?;

    let error = match entry.get("error") {
        Some(error_value) => Some(parse_expectation(error_value, &name, "error")?),
        None => None,
    };

    let params = entry
        .get("params")
        .map(yaml_to_json_map)
        .unwrap_or_default();
    let context = entry.get("context");
    let secrets = parse_string_map(context.and_then(|c| c.get("secrets")));
    let environment = parse_string_map(context.and_then(|c| c.get("environment")));

    Ok(Scenario {
        name,
        steps,
        params,
        secrets,
        environment,
        invoke,
        error,
        common: false,
    })
}

fn parse_step(value: &Yaml, scenario_name: &str) -> Result<Step, Error> {
    let request_value = value.get("request").ok_or_else(|| {
        malformed(format!(
            "scenario '{}': step is missing 'request'",
            scenario_name
        ))
    })?;
    let request: RequestSpec = serde_yaml::from_value(request_value.clone()).map_err(|e| {
        malformed(format!(
            "scenario '{}': invalid 'request': {}",
            scenario_name, e
        ))
    })?;

    let fixture_path = value
        .get("fixture")
        .and_then(Yaml::as_str)
        .map(String::from);
    let network_error = value
        .get("networkError")
        .and_then(Yaml::as_bool)
        .unwrap_or(false);

    Ok(Step {
        request,
        fixture_path,
        fixture: None,
        network_error,
    })
}

fn parse_expectation(value: &Yaml, scenario_name: &str, field: &str) -> Result<Expectation, Error> {
    if let Some(returns) = value.get("returns") {
        return Ok(Expectation::Returns(yaml_to_json_map(returns)));
    }
    if let Some(throws) = value.get("throws") {
        return Ok(Expectation::Throws(scalar_string(throws)));
    }
    Err(malformed(format!(
        "scenario '{}': '{}' must declare 'returns' or 'throws'",
        scenario_name, field
    )))
}

fn parse_string_map(value: Option<&Yaml>) -> HashMap<String, String> {
    let mut map = HashMap::new();
    if let Some(Yaml::Mapping(mapping)) = value {
        for (key, item) in mapping {
            map.insert(scalar_string(key), scalar_string(item));
        }
    }
    map
}

fn scalar_string(value: &Yaml) -> String {
    match value {
        Yaml::String(s) => s.clone(),
        Yaml::Bool(b) => b.to_string(),
        Yaml::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

fn yaml_to_json_map(value: &Yaml) -> Map<String, Value> {
    match yaml_to_json(value) {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn yaml_to_json(value: &Yaml) -> Value {
    match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(*b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
        }
        Yaml::String(s) => Value::String(s.clone()),
        Yaml::Sequence(items) => Value::Array(items.iter().map(yaml_to_json).collect()),
        Yaml::Mapping(mapping) => {
            let mut map = Map::new();
            for (key, item) in mapping {
                map.insert(scalar_string(key), yaml_to_json(item));
            }
            Value::Object(map)
        }
        Yaml::Tagged(tagged) => yaml_to_json(&tagged.value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const MINIMAL: &str = r#"
action:
  params:
    userId: usr123
  context:
    secrets:
      apiToken: test-token
    environment:
      baseUrl: https://dev-123.okta.com

scenarios:
  - name: suspends active user
    request:
      method: POST
      url: https://dev-123.okta.com/api/v1/users/usr123/lifecycle/suspend
    fixture: suspend_success.http
    invoke:
      returns:
        suspended: true
"#;

    fn parse_without_common(yaml: &str) -> Result<ScenarioSet, Error> {
        parse(
            yaml,
            &ParseOptions {
                include_common: false,
            },
        )
    }

    fn expect_malformed(yaml: &str, fragment: &str) {
        match parse_without_common(yaml) {
            Err(Error::MalformedScenarioFile(message)) => assert!(
                message.contains(fragment),
                "message '{}' should contain '{}'",
                message,
                fragment
            ),
            other => panic!("expected MalformedScenarioFile, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn parses_action_defaults_and_scenarios() {
        let set = parse_without_common(MINIMAL).unwrap();

        assert_eq!(set.action.params.get("userId"), Some(&json!("usr123")));
        assert_eq!(
            set.action.secrets.get("apiToken"),
            Some(&String::from("test-token"))
        );
        assert_eq!(
            set.action.environment.get("baseUrl"),
            Some(&String::from("https://dev-123.okta.com"))
        );
        assert_eq!(set.scenarios.len(), 1);
    }

    #[test]
    fn shorthand_becomes_a_single_step() {
        let set = parse_without_common(MINIMAL).unwrap();
        let scenario = &set.scenarios[0];

        assert_eq!(scenario.steps.len(), 1);
        assert_eq!(scenario.steps[0].request.method, "POST");
        assert_eq!(
            scenario.steps[0].fixture_path.as_deref(),
            Some("suspend_success.http")
        );
        assert!(!scenario.steps[0].network_error);
    }

    #[test]
    fn missing_action_section_names_the_field() {
        expect_malformed("scenarios:\n  - name: x\n", "action");
    }

    #[test]
    fn missing_scenarios_section_names_the_field() {
        expect_malformed("action: {}\n", "scenarios");
    }

    #[test]
    fn empty_scenarios_sequence_is_rejected() {
        expect_malformed("action: {}\nscenarios: []\n", "scenarios");
    }

    #[test]
    fn scenario_without_name_names_the_field() {
        expect_malformed(
            "action: {}\nscenarios:\n  - invoke:\n      throws: ''\n",
            "name",
        );
    }

    #[test]
    fn scenario_without_steps_or_request_is_rejected() {
        expect_malformed(
            "action: {}\nscenarios:\n  - name: broken\n    invoke:\n      throws: ''\n",
            "'steps' or a 'request'",
        );
    }

    #[test]
    fn scenario_without_invoke_names_the_field() {
        expect_malformed(
            "action: {}\nscenarios:\n  - name: broken\n    request:\n      method: GET\n      url: https://x.test/\n",
            "invoke",
        );
    }

    #[test]
    fn expectation_without_returns_or_throws_is_rejected() {
        expect_malformed(
            "action: {}\nscenarios:\n  - name: broken\n    request:\n      method: GET\n      url: https://x.test/\n    invoke: {}\n",
            "'returns' or 'throws'",
        );
    }

    #[test]
    fn steps_form_parses_network_error_flags() {
        let yaml = r#"
action: {}
scenarios:
  - name: flaky upstream
    steps:
      - request:
          method: GET
          url: https://x.test/a
        fixture: a.http
      - request:
          method: GET
          url: https://x.test/b
        networkError: true
    invoke:
      throws: ''
"#;
        let set = parse_without_common(yaml).unwrap();
        let steps = &set.scenarios[0].steps;

        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].fixture_path.as_deref(), Some("a.http"));
        assert!(steps[1].network_error);
        assert!(steps[1].fixture_path.is_none());
    }

    #[test]
    fn include_common_appends_the_template_library_after_user_scenarios() {
        let set = parse(MINIMAL, &ParseOptions::default()).unwrap();

        assert_eq!(set.scenarios.len(), 1 + 8);
        assert!(!set.scenarios[0].common);
        assert!(set.scenarios[1..].iter().all(|s| s.common));
        // synthesized from the first scenario's first request
        assert!(set.scenarios[1].steps[0].request.url.contains("okta.com"));
    }

    #[test]
    fn user_scenario_names_suppress_matching_templates() {
        let yaml = r#"
action: {}
scenarios:
  - name: 429 rate limited
    request:
      method: GET
      url: https://x.test/
    fixture: custom.http
    invoke:
      throws: 'rate limit'
"#;
        let set = parse(yaml, &ParseOptions::default()).unwrap();

        assert_eq!(set.scenarios.len(), 1 + 7);
        let mut names = HashSet::new();
        for scenario in &set.scenarios {
            assert!(names.insert(scenario.name.clone()), "duplicate name");
        }
        // the user-defined one kept its own definition
        assert!(!set.scenarios[0].common);
    }

    #[test]
    fn throws_expectation_accepts_the_empty_string() {
        let yaml = r#"
action: {}
scenarios:
  - name: anything goes
    request:
      method: GET
      url: https://x.test/
    networkError: true
    invoke:
      throws: ''
"#;
        let set = parse_without_common(yaml).unwrap();

        match &set.scenarios[0].invoke {
            Expectation::Throws(substring) => assert_eq!(substring, ""),
            other => panic!("expected Throws, got {:?}", other),
        }
    }

    #[test]
    fn scenario_overrides_win_key_for_key() {
        let action = ActionDefaults {
            params: json!({"a": 1, "b": 2}).as_object().cloned().unwrap_or_default(),
            secrets: HashMap::new(),
            environment: HashMap::new(),
        };
        let yaml = r#"
action: {}
scenarios:
  - name: override
    params:
      b: 3
      c: 4
    request:
      method: GET
      url: https://x.test/
    networkError: true
    invoke:
      throws: ''
"#;
        let set = parse_without_common(yaml).unwrap();
        let merged = merge_defaults(&action, &set.scenarios[0]);

        assert_eq!(merged.params.get("a"), Some(&json!(1)));
        assert_eq!(merged.params.get("b"), Some(&json!(3)));
        assert_eq!(merged.params.get("c"), Some(&json!(4)));
    }

    #[test]
    fn scenario_context_overrides_merge_one_for_one() {
        let mut action = ActionDefaults::default();
        action
            .secrets
            .insert(String::from("apiToken"), String::from("base"));
        action
            .environment
            .insert(String::from("baseUrl"), String::from("https://base.test"));
        let yaml = r#"
action: {}
scenarios:
  - name: override
    context:
      secrets:
        apiToken: override
    request:
      method: GET
      url: https://x.test/
    networkError: true
    invoke:
      throws: ''
"#;
        let set = parse_without_common(yaml).unwrap();
        let merged = merge_defaults(&action, &set.scenarios[0]);

        assert_eq!(merged.secrets.get("apiToken"), Some(&String::from("override")));
        assert_eq!(
            merged.environment.get("baseUrl"),
            Some(&String::from("https://base.test"))
        );
    }

    #[test]
    fn parse_file_records_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("set.yaml");
        fs::write(&path, MINIMAL).unwrap();

        let set = parse_file(
            &path,
            &ParseOptions {
                include_common: false,
            },
        )
        .unwrap();

        assert_eq!(set.path.as_deref(), Some(path.as_path()));
    }
}
