use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::CoreError;

/// Opaque, module-supplied transaction data
///
/// The engine never inspects the payload beyond merging workflow bookkeeping
/// keys into it; each module reads it through its own typed view.
pub type Payload = Map<String, Value>;

/// Build a payload from any JSON value.
///
/// Objects are used as-is, anything else is wrapped under a `value` key.
pub fn payload_from(value: Value) -> Payload {
    match value {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            map
        }
    }
}

/// Value object: business module identifier (`sales`, `inventory`, ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleId(pub String);

impl ModuleId {
    /// Create a new module identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModuleId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ModuleId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&ModuleId> for ModuleId {
    fn from(id: &ModuleId) -> Self {
        id.clone()
    }
}

impl PartialEq<str> for ModuleId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ModuleId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Reporting window requested from the backend analytics endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AnalyticsPeriod {
    /// Last 7 days
    #[serde(rename = "7d")]
    Week,
    /// Last 30 days
    #[default]
    #[serde(rename = "30d")]
    Month,
    /// Last 90 days
    #[serde(rename = "90d")]
    Quarter,
    /// Last 365 days
    #[serde(rename = "365d")]
    Year,
}

impl AnalyticsPeriod {
    /// Wire representation used by the backend
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalyticsPeriod::Week => "7d",
            AnalyticsPeriod::Month => "30d",
            AnalyticsPeriod::Quarter => "90d",
            AnalyticsPeriod::Year => "365d",
        }
    }
}

impl fmt::Display for AnalyticsPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalyticsPeriod {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "7d" | "week" => Ok(AnalyticsPeriod::Week),
            "30d" | "month" => Ok(AnalyticsPeriod::Month),
            "90d" | "quarter" => Ok(AnalyticsPeriod::Quarter),
            "365d" | "1y" | "year" => Ok(AnalyticsPeriod::Year),
            other => Err(CoreError::ValidationError(format!(
                "Unsupported analytics period: {}",
                other
            ))),
        }
    }
}

/// Aggregate analytics for one module, exactly as the backend supplied it
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalyticsSnapshot(pub Value);

impl AnalyticsSnapshot {
    /// Wrap a backend value
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Access the raw value
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Look up a top-level field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Number of transactions the module received, if reported
    pub fn incoming_count(&self) -> Option<u64> {
        self.get("incoming_count").and_then(Value::as_u64)
    }

    /// Number of transactions the module originated, if reported
    pub fn outgoing_count(&self) -> Option<u64> {
        self.get("outgoing_count").and_then(Value::as_u64)
    }

    /// Total monetary value, if reported
    pub fn total_value(&self) -> Option<f64> {
        self.get("total_value").and_then(Value::as_f64)
    }
}
