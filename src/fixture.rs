//! Parses raw captured HTTP response text (`.http` files) into [`ResponseData`].

use crate::data::ResponseData;
use crate::error::Error;
use lazy_static::lazy_static;
use regex::Regex;
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

lazy_static! {
    static ref STATUS_LINE_REGEX: Regex =
        Regex::new(r"^(?P<protocol>\S+)\s+(?P<status_code>\d{3})(?:\s+(?P<reason>.*))?$").unwrap();
}

/// Parses literal captured HTTP response text: a status line, header lines,
/// a blank line, then the body verbatim (including internal blank lines).
/// No blank-line boundary means an empty body.
///
/// A repeated header name overwrites the earlier value (last occurrence
/// wins), so multi-valued headers such as `Set-Cookie` collapse to one.
pub fn parse(raw: &str) -> Result<ResponseData, Error> {
    let normalized = raw.replace("\r\n", "\n").replace('\r', "\n");

    let (header_block, body) = match normalized.find("\n\n") {
        Some(boundary) => (
            &normalized[..boundary],
            normalized[boundary + 2..].to_string(),
        ),
        None => (normalized.as_str(), String::new()),
    };

    let mut lines = header_block.lines();
    let status_line = lines.next().unwrap_or("").trim_end();
    let captures = STATUS_LINE_REGEX.captures(status_line).ok_or_else(|| {
        Error::MalformedFixture(format!("no recognizable status line: '{}'", status_line))
    })?;
    let status_code = captures["status_code"]
        .parse()
        .map_err(|_| Error::MalformedFixture(format!("invalid status code in '{}'", status_line)))?;

    let mut headers = HashMap::new();
    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        if let Some(colon) = line.find(':') {
            headers.insert(
                line[..colon].trim().to_string(),
                line[colon + 1..].trim().to_string(),
            );
        }
    }

    Ok(ResponseData {
        status_code,
        headers,
        body,
    })
}

/// Reads and parses a fixture file, resolving `path` against `base_dir`
/// unless it is already absolute.
pub fn load<P: AsRef<Path>, B: AsRef<Path>>(path: P, base_dir: B) -> Result<ResponseData, Error> {
    let path = path.as_ref();
    let resolved: PathBuf = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.as_ref().join(path)
    };

    let contents = fs::read_to_string(&resolved).map_err(|source| Error::FixtureNotFound {
        path: resolved.display().to_string(),
        source,
    })?;

    parse(&contents)
}

/// Renders a response back into `.http` fixture text. `parse(&render(r))`
/// yields `r` again.
pub fn render(response: &ResponseData) -> String {
    let mut text = format!("HTTP/1.1 {}\n", response.status_code);
    for (name, value) in &response.headers {
        text.push_str(&format!("{}: {}\n", name, value));
    }
    text.push('\n');
    text.push_str(&response.body);
    text
}
