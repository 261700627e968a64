//! Pruning of metadata documents keyed by compiled-unit name.

use anyhow::{bail, Context};
use serde_json::{Map, Value};

use crate::jar::utils::paths::CLASS_SUFFIX;

pub fn parse_metadata(name: &str, data: &[u8]) -> anyhow::Result<Map<String, Value>> {
    let value: Value =
        serde_json::from_slice(data).with_context(|| format!("{name} is not valid JSON"))?;
    match value {
        Value::Object(map) => Ok(map),
        other => bail!("{name} is not a JSON object but {}", json_kind(&other)),
    }
}

/// Keeps the keys whose unit (`<key>.class`) passes `keep`.
pub fn prune_metadata(
    metadata: &Map<String, Value>,
    mut keep: impl FnMut(&str) -> bool,
) -> Map<String, Value> {
    metadata
        .iter()
        .filter(|(key, _)| keep(&format!("{key}{CLASS_SUFFIX}")))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

pub fn render_metadata(metadata: &Map<String, Value>) -> anyhow::Result<Vec<u8>> {
    Ok(serde_json::to_vec(metadata)?)
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
