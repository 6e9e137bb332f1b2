//! Seeds starter scenario and fixture files from an action metadata
//! description.

use crate::data::ResponseData;
use crate::error::Error;
use crate::fixture;
use serde::Deserialize;
use std::{
    collections::{BTreeMap, HashMap},
    fmt::Write as _,
    fs,
    path::{Path, PathBuf},
};

#[derive(Debug, Deserialize)]
pub struct ActionMetadata {
    pub name: String,
    #[serde(default)]
    pub inputs: BTreeMap<String, InputMetadata>,
}

#[derive(Debug, Deserialize)]
pub struct InputMetadata {
    #[serde(rename = "type", default = "default_input_type")]
    pub input_type: String,
    #[serde(default)]
    pub required: bool,
}

fn default_input_type() -> String {
    String::from("string")
}

#[derive(Debug)]
pub struct ScaffoldOutput {
    pub scenario_file: PathBuf,
    pub fixture_file: PathBuf,
}

/// Reads the metadata file and writes `<name>.scenarios.yaml` plus a
/// starter success fixture into `out_dir`. Existing files are never
/// overwritten.
pub fn generate<P: AsRef<Path>, D: AsRef<Path>>(
    metadata_path: P,
    out_dir: D,
) -> Result<ScaffoldOutput, Error> {
    let metadata_text = fs::read_to_string(metadata_path.as_ref())?;
    let metadata: ActionMetadata = serde_yaml::from_str(&metadata_text)?;

    let out_dir = out_dir.as_ref();
    let fixture_name = format!("{}.success.http", metadata.name);
    let scenario_file = out_dir.join(format!("{}.scenarios.yaml", metadata.name));
    let fixture_file = out_dir.join(&fixture_name);

    for target in [&scenario_file, &fixture_file].iter() {
        if target.exists() {
            return Err(Error::ScaffoldTargetExists(target.display().to_string()));
        }
    }

    fs::write(&scenario_file, render_scenarios(&metadata, &fixture_name))?;
    fs::write(&fixture_file, fixture::render(&starter_fixture()))?;

    Ok(ScaffoldOutput {
        scenario_file,
        fixture_file,
    })
}

fn starter_fixture() -> ResponseData {
    let mut headers = HashMap::new();
    headers.insert(
        String::from("Content-Type"),
        String::from("application/json"),
    );
    ResponseData {
        status_code: 200,
        headers,
        body: String::from("{\"ok\": true}\n"),
    }
}

fn placeholder_for(input_type: &str) -> &'static str {
    match input_type {
        "number" | "integer" => "1",
        "boolean" => "true",
        _ => "example",
    }
}

fn render_scenarios(metadata: &ActionMetadata, fixture_name: &str) -> String {
    let mut text = String::new();
    let _ = writeln!(text, "action:");
    let _ = writeln!(text, "  params:");
    if metadata.inputs.is_empty() {
        let _ = writeln!(text, "    {{}}");
    }
    for (name, input) in &metadata.inputs {
        let marker = if input.required { "  # required" } else { "" };
        let _ = writeln!(
            text,
            "    {}: {}{}",
            name,
            placeholder_for(&input.input_type),
            marker
        );
    }
    let _ = writeln!(text, "  context:");
    let _ = writeln!(text, "    secrets:");
    let _ = writeln!(text, "      apiToken: test-token");
    let _ = writeln!(text, "    environment:");
    let _ = writeln!(text, "      baseUrl: https://example.test");
    let _ = writeln!(text);
    let _ = writeln!(text, "scenarios:");
    let _ = writeln!(text, "  - name: happy path");
    let _ = writeln!(text, "    request:");
    let _ = writeln!(text, "      method: GET");
    let _ = writeln!(text, "      url: https://example.test/{}", metadata.name);
    let _ = writeln!(text, "    fixture: {}", fixture_name);
    let _ = writeln!(text, "    invoke:");
    let _ = writeln!(text, "      returns:");
    let _ = writeln!(text, "        ok: true");
    text
}
