//! JSON sample ingestion.
//!
//! Accepted documents:
//! - `{ "<entity>": [sample, ...], ... }`
//! - `[{ "vehicle_id": "<entity>", "data": [sample, ...] }, ...]`
//! - a single `{ "vehicle_id": ..., "data": [...] }` object
//!
//! Sample field aliases (`speed_kmh`, `offpath_deviation`, `states`, ...) are
//! handled by `RawSample`'s serde attributes. Timestamps stay unparsed here;
//! the player validates them on load.

use anyhow::{bail, Context, Result};
use indexmap::IndexMap;
use log::{debug, info};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

use crate::core::sample::RawSample;

/// Entity id -> samples, in document order
pub type EntitySamples = IndexMap<String, Vec<RawSample>>;

/// Per-vehicle playback response
#[derive(Debug, Deserialize)]
struct PlaybackResponse {
    #[serde(alias = "entity_id", alias = "entityId")]
    vehicle_id: String,
    #[serde(default)]
    data: Vec<RawSample>,
}

/// Parse a JSON document into per-entity samples.
pub fn parse_entities(json: &str) -> Result<EntitySamples> {
    let value: Value = serde_json::from_str(json).context("Input is not valid JSON")?;
    from_value(value)
}

pub fn from_value(value: Value) -> Result<EntitySamples> {
    let mut out = EntitySamples::new();
    match value {
        Value::Array(items) => {
            for (i, item) in items.into_iter().enumerate() {
                let resp: PlaybackResponse = serde_json::from_value(item)
                    .with_context(|| format!("Invalid playback response at index {}", i))?;
                push_samples(&mut out, resp.vehicle_id, resp.data);
            }
        }
        Value::Object(map) if is_single_response(&map) => {
            let resp: PlaybackResponse =
                serde_json::from_value(Value::Object(map)).context("Invalid playback response")?;
            push_samples(&mut out, resp.vehicle_id, resp.data);
        }
        Value::Object(map) => {
            for (entity_id, samples) in map {
                let samples: Vec<RawSample> = serde_json::from_value(samples)
                    .with_context(|| format!("Invalid samples for entity '{}'", entity_id))?;
                push_samples(&mut out, entity_id, samples);
            }
        }
        other => bail!("Expected an object or array of entities, got {}", json_type(&other)),
    }
    Ok(out)
}

/// Read and parse a JSON file.
pub fn load_file(path: &Path) -> Result<EntitySamples> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read input: {}", path.display()))?;
    let entities = parse_entities(&text).with_context(|| format!("Failed to parse input: {}", path.display()))?;
    info!(
        "Read {} entities ({} samples) from {}",
        entities.len(),
        entities.values().map(Vec::len).sum::<usize>(),
        path.display()
    );
    Ok(entities)
}

fn is_single_response(map: &serde_json::Map<String, Value>) -> bool {
    map.get("data").is_some_and(Value::is_array)
        && ["vehicle_id", "entity_id", "entityId"].iter().any(|k| map.get(*k).is_some_and(Value::is_string))
}

/// Append, filling blank entity ids from the key. Repeated keys merge.
fn push_samples(out: &mut EntitySamples, entity_id: String, samples: Vec<RawSample>) {
    let slot = out.entry(entity_id.clone()).or_default();
    if !slot.is_empty() {
        debug!("Merging repeated entity '{}'", entity_id);
    }
    slot.extend(samples.into_iter().map(|mut s| {
        if s.entity_id.is_empty() {
            s.entity_id = entity_id.clone();
        }
        s
    }));
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
