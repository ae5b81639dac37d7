//! Telemetry samples, interpolated positions and time helpers.
//!
//! Raw samples arrive with string timestamps (see `loader`). They are parsed
//! once at load time into [`Sample`], which keeps the instant as integer
//! milliseconds since the Unix epoch (UTC). Everything the player publishes
//! converts back to RFC 3339 via [`format_timestamp`].

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Naive layouts accepted in addition to RFC 3339 (interpreted as UTC)
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Discrete vehicle states. Snapped, never blended.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoricalState {
    #[serde(default, alias = "controller_mode", alias = "motion_controller", skip_serializing_if = "Option::is_none")]
    pub controller_mode: Option<String>,
    #[serde(default, alias = "asset_activity", skip_serializing_if = "Option::is_none")]
    pub activity: Option<String>,
    #[serde(default, alias = "haulage_state", skip_serializing_if = "Option::is_none")]
    pub haulage_state: Option<String>,
}

impl CategoricalState {
    pub fn is_empty(&self) -> bool {
        self.controller_mode.is_none() && self.activity.is_none() && self.haulage_state.is_none()
    }
}

/// Sample as it arrives from upstream, timestamp still unparsed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    #[serde(default, alias = "vehicle_id", alias = "entityId")]
    pub entity_id: String,
    /// Missing, null or non-string values become unparsable and the sample is dropped on load
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, alias = "speed_kmh")]
    pub speed: f64,
    #[serde(default, alias = "offpath_deviation")]
    pub deviation: Option<f64>,
    #[serde(default, alias = "states", alias = "categoricalState")]
    pub categorical_state: Option<CategoricalState>,
}

fn lenient_timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => s,
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    })
}

/// One validated, immutable telemetry record.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    pub entity_id: String,
    /// Milliseconds since the Unix epoch (UTC)
    pub timestamp_ms: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub speed: f64,
    pub deviation: Option<f64>,
    pub categorical_state: Option<CategoricalState>,
}

impl Sample {
    /// Validate a raw sample. Returns `None` when the timestamp cannot be parsed.
    pub fn from_raw(raw: RawSample) -> Option<Self> {
        let timestamp_ms = parse_timestamp(&raw.timestamp)?;
        Some(Self {
            entity_id: raw.entity_id,
            timestamp_ms,
            latitude: raw.latitude,
            longitude: raw.longitude,
            speed: raw.speed,
            deviation: raw.deviation,
            categorical_state: raw.categorical_state.filter(|s| !s.is_empty()),
        })
    }
}

/// Entity position published to renderers (sample shape + `interpolated`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub entity_id: String,
    pub timestamp: String,
    pub latitude: f64,
    pub longitude: f64,
    pub speed: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deviation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categorical_state: Option<CategoricalState>,
    /// True only when strictly between two samples
    pub interpolated: bool,
}

impl Position {
    /// Exact copy of a sample (held or hit exactly).
    pub fn from_sample(sample: &Sample) -> Self {
        Self {
            entity_id: sample.entity_id.clone(),
            timestamp: format_timestamp(sample.timestamp_ms),
            latitude: sample.latitude,
            longitude: sample.longitude,
            speed: sample.speed,
            deviation: sample.deviation,
            categorical_state: sample.categorical_state.clone(),
            interpolated: false,
        }
    }
}

/// Parse an absolute instant into epoch milliseconds.
///
/// Accepts RFC 3339 (with `Z` or offset) and naive ISO-like forms, the latter
/// taken as UTC.
pub fn parse_timestamp(s: &str) -> Option<i64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc().timestamp_millis())
}

/// Format epoch milliseconds as RFC 3339 with millisecond precision.
pub fn format_timestamp(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}
