//! Parsing of the per-track hint payload
//!
//! Hints arrive as a JSON array of `{timestamp, duration, volume}` objects,
//! positionally matched to the uploaded background files. The array shape is
//! enforced; individual numeric fields are read leniently.

use std::path::PathBuf;

use serde_json::Value;

use crate::error::MetadataFormatError;
use crate::types::{BackgroundInput, TrackHint};

/// Parse the raw hint payload.
///
/// An empty or whitespace-only payload yields no hints.
pub fn parse_hints(raw: &str) -> Result<Vec<TrackHint>, MetadataFormatError> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }

    let value: Value = serde_json::from_str(raw)
        .map_err(|e| MetadataFormatError::new(format!("not valid JSON: {}", e)))?;

    let entries = match value {
        Value::Array(entries) => entries,
        other => {
            return Err(MetadataFormatError::new(format!(
                "expected a JSON array, got {}",
                json_kind(&other)
            )))
        }
    };

    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| match entry {
            Value::Null => Ok(TrackHint::default()),
            Value::Object(fields) => Ok(TrackHint {
                timestamp: fields.get("timestamp").and_then(lenient_number),
                duration: fields.get("duration").and_then(lenient_number),
                volume: fields.get("volume").and_then(lenient_number),
            }),
            other => Err(MetadataFormatError::new(format!(
                "entry {} must be an object, got {}",
                i,
                json_kind(other)
            ))),
        })
        .collect()
}

/// Pair uploaded background files with hints by position.
///
/// Files without a hint get the default hint; hints beyond the file count are
/// ignored.
pub fn pair_hints(paths: Vec<PathBuf>, hints: &[TrackHint]) -> Vec<BackgroundInput> {
    if hints.len() > paths.len() {
        tracing::debug!(
            files = paths.len(),
            hints = hints.len(),
            "ignoring {} surplus hint(s)",
            hints.len() - paths.len()
        );
    }

    paths
        .into_iter()
        .enumerate()
        .map(|(i, path)| BackgroundInput {
            path,
            hint: hints.get(i).copied().unwrap_or_default(),
        })
        .collect()
}

/// Read a JSON number or numeric string as a finite `f64`.
fn lenient_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
