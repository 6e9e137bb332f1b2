//! The orchestrator: parse a scenario file once, then execute every
//! scenario in isolation against the script, with interception scoped to
//! each scenario's lifetime.

use crate::assert::assert_scenario;
use crate::data::{Scenario, ScenarioSet, Step};
use crate::error::Error;
use crate::fixture;
use crate::interceptor::{InterceptionGuard, MockTransport};
use crate::scenario::{self, merge_defaults, ParseOptions};
use crate::script::{Context, Params, QuietSink, ScriptHandle, ScriptSource};
use log::{debug, info};
use std::{
    env, fmt,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::runtime::Runtime;

#[derive(Debug)]
pub struct RunConfiguration {
    pub script: ScriptSource,
    /// The scenario file, resolved against `caller_dir` unless absolute.
    pub scenarios: PathBuf,
    pub include_common: bool,
    /// Defaults to the current working directory.
    pub caller_dir: Option<PathBuf>,
}

impl RunConfiguration {
    pub fn new<P: Into<PathBuf>>(script: ScriptSource, scenarios: P) -> Self {
        RunConfiguration {
            script,
            scenarios: scenarios.into(),
            include_common: true,
            caller_dir: None,
        }
    }
}

/// One scenario's recorded result.
#[derive(Debug)]
pub struct ScenarioOutcome {
    pub name: String,
    pub common: bool,
    pub result: Result<(), Error>,
}

/// The results of one full run, one entry per scenario. Scenarios are
/// isolated: a failure is recorded here instead of aborting the rest.
#[derive(Debug)]
pub struct RunReport {
    pub outcomes: Vec<ScenarioOutcome>,
}

impl RunReport {
    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.passed()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    pub fn outcome(&self, name: &str) -> Option<&ScenarioOutcome> {
        self.outcomes.iter().find(|o| o.name == name)
    }

    /// Panics with the formatted report when any scenario failed. Intended
    /// for embedding a whole run in one test function.
    pub fn assert_success(&self) {
        if !self.is_success() {
            panic!("{}", self);
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} scenario(s): {} passed, {} failed",
            self.outcomes.len(),
            self.passed(),
            self.failed()
        )?;
        for outcome in &self.outcomes {
            match &outcome.result {
                Ok(()) => writeln!(f, "  PASS {}", outcome.name)?,
                Err(error) => writeln!(f, "  FAIL {}: {}", outcome.name, error)?,
            }
        }
        Ok(())
    }
}

/// Parses the scenario file and executes every scenario. Parsing and
/// script-resolution failures abort the whole run (authoring mistakes, not
/// test failures); per-scenario failures land in the report.
pub async fn run(configuration: RunConfiguration) -> Result<RunReport, Error> {
    let caller_dir = match &configuration.caller_dir {
        Some(dir) => dir.clone(),
        None => env::current_dir()?,
    };
    let scenarios_path = if configuration.scenarios.is_absolute() {
        configuration.scenarios.clone()
    } else {
        caller_dir.join(&configuration.scenarios)
    };

    let options = ParseOptions {
        include_common: configuration.include_common,
    };
    let set = scenario::parse_file(&scenarios_path, &options)?;
    info!(
        "running {} scenario(s) from {}",
        set.scenarios.len(),
        scenarios_path.display()
    );

    // fixture paths resolve relative to the scenario file's directory
    let base_dir = scenarios_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let script = ScriptHandle::new(configuration.script);

    let mut outcomes = Vec::with_capacity(set.scenarios.len());
    for scenario in &set.scenarios {
        debug!("scenario '{}'", scenario.name);
        // resolved lazily on first use, cached for the rest of the run; a
        // missing script aborts everything
        let script = script.get()?;
        let result = run_scenario(script.as_ref(), &set, scenario, &base_dir).await;
        outcomes.push(ScenarioOutcome {
            name: scenario.name.clone(),
            common: scenario.common,
            result,
        });
    }

    Ok(RunReport { outcomes })
}

/// Blocking wrapper around [`run`] for callers without a runtime.
pub fn run_blocking(configuration: RunConfiguration) -> Result<RunReport, Error> {
    Runtime::new()?.block_on(run(configuration))
}

async fn run_scenario(
    script: &dyn crate::script::ActionScript,
    set: &ScenarioSet,
    scenario: &Scenario,
    base_dir: &Path,
) -> Result<(), Error> {
    let merged = merge_defaults(&set.action, scenario);
    let steps = resolve_steps(&scenario.steps, base_dir)?;

    let (transport, handles) = MockTransport::install(&steps)?;
    let _guard = InterceptionGuard::new(transport.clone());

    let context = Context {
        secrets: merged.secrets,
        environment: merged.environment,
        http: transport,
        // script chatter stays out of test output
        console: Arc::new(QuietSink),
    };
    let params: Params = merged.params;

    let assertion = assert_scenario(script, &params, &context, scenario).await;

    // Satisfaction is checked even when the assertion already failed; an
    // assertion failure takes precedence in the outcome.
    let satisfaction = handles
        .iter()
        .try_for_each(|handle| handle.verify_satisfied());

    assertion.and(satisfaction)
}

fn resolve_steps(steps: &[Step], base_dir: &Path) -> Result<Vec<Step>, Error> {
    steps
        .iter()
        .map(|step| {
            let mut resolved = step.clone();
            if resolved.fixture.is_none() && !resolved.network_error {
                if let Some(path) = &resolved.fixture_path {
                    resolved.fixture = Some(fixture::load(path, base_dir)?);
                }
            }
            Ok(resolved)
        })
        .collect()
}
