use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;

/// Keys of a snapshot that the dashboard knows how to display.
pub const KNOWN_SNAPSHOT_KEYS: [&str; 5] = ["x", "y", "z", "joints", "status"];

/// One stored telemetry record as returned by the read endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Storage key of the record
    #[serde(default, deserialize_with = "null_as_default")]
    pub key: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub timestamp: String,
    #[serde(default)]
    pub message_id: Option<String>,
    /// Stored object size in bytes
    #[serde(default, deserialize_with = "null_as_default")]
    pub size: u64,
    #[serde(default)]
    pub data: RobotSnapshot,
}

/// Treats an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Robot state as published by the robot. Kept as raw JSON so that fields
/// we do not interpret survive untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RobotSnapshot(pub Value);

impl RobotSnapshot {
    fn number(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(Value::as_f64)
    }

    pub fn x(&self) -> Option<f64> {
        self.number("x")
    }

    pub fn y(&self) -> Option<f64> {
        self.number("y")
    }

    pub fn z(&self) -> Option<f64> {
        self.number("z")
    }

    pub fn status(&self) -> Option<&str> {
        self.0.get("status").and_then(Value::as_str)
    }

    /// Joint angles in radians. Non-numeric elements become NaN so that the
    /// positions of the remaining angles are preserved.
    pub fn joints(&self) -> Option<Vec<f64>> {
        let joints = self.0.get("joints")?.as_array()?;
        Some(
            joints
                .iter()
                .map(|j| j.as_f64().unwrap_or(f64::NAN))
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        match &self.0 {
            Value::Null => true,
            Value::Object(map) => map.is_empty(),
            _ => false,
        }
    }

    /// Keys outside of `KNOWN_SNAPSHOT_KEYS`, in document order.
    pub fn extra_keys(&self) -> Vec<&str> {
        match &self.0 {
            Value::Object(map) => map
                .keys()
                .map(String::as_str)
                .filter(|k| !KNOWN_SNAPSHOT_KEYS.contains(k))
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// A control command. Any JSON value is accepted; canned commands are
/// objects with an `action` field plus parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Command(pub Value);

impl Command {
    pub fn new(action: &str) -> Self {
        let mut map = Map::new();
        map.insert("action".to_string(), Value::String(action.to_string()));
        Self(Value::Object(map))
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        if let Value::Object(ref mut map) = self.0 {
            map.insert(key.to_string(), value.into());
        }
        self
    }

    pub fn action(&self) -> Option<&str> {
        self.0.get("action").and_then(Value::as_str)
    }
}

#[derive(Debug, Serialize)]
pub struct CommandRequest<'a> {
    pub command: &'a Command,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogsResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub logs: Option<Vec<LogEntry>>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, rename = "messageId")]
    pub message_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Result order requested from the read endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Date path segment expected by the read endpoint, e.g. `2024/01/31`.
pub fn date_param(date: NaiveDate) -> String {
    date.format("%Y/%m/%d").to_string()
}

/// Chronological comparison when both timestamps are RFC 3339, lexical
/// otherwise.
pub fn compare_timestamps(a: &str, b: &str) -> Ordering {
    match (
        DateTime::parse_from_rfc3339(a),
        DateTime::parse_from_rfc3339(b),
    ) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}

/// Stable ascending sort by timestamp.
pub fn sort_ascending(logs: &mut [LogEntry]) {
    logs.sort_by(|a, b| compare_timestamps(&a.timestamp, &b.timestamp));
}
