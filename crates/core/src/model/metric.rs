use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

pub type Labels = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    Counter,
    Gauge,
    Histogram,
    Summary,
    #[default]
    #[serde(other)]
    Unknown,
}

impl MetricType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Counter => "counter",
            Self::Gauge => "gauge",
            Self::Histogram => "histogram",
            Self::Summary => "summary",
            Self::Unknown => "unknown",
        }
    }
}

impl FromStr for MetricType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "counter" => Self::Counter,
            "gauge" => Self::Gauge,
            "histogram" => Self::Histogram,
            "summary" => Self::Summary,
            _ => Self::Unknown,
        })
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observed value. The value stays a string so the source formatting
/// survives until presentation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetricSample {
    #[serde(default, deserialize_with = "labels_from_json")]
    pub labels: Labels,
    #[serde(
        default = "missing_value",
        deserialize_with = "value_from_string_or_number"
    )]
    pub value: String,
}

impl MetricSample {
    pub fn new(labels: Labels, value: impl Into<String>) -> Self {
        Self {
            labels,
            value: value.into(),
        }
    }

    pub fn unlabeled(value: impl Into<String>) -> Self {
        Self::new(Labels::new(), value)
    }

    pub fn numeric_value(&self) -> Option<f64> {
        parse_sample_value(&self.value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CanonicalMetric {
    pub name: String,
    #[serde(default, deserialize_with = "string_or_empty")]
    pub help: String,
    #[serde(rename = "type", default, deserialize_with = "type_or_unknown")]
    pub metric_type: MetricType,
    #[serde(default, deserialize_with = "samples_or_empty")]
    pub values: Vec<MetricSample>,
}

impl CanonicalMetric {
    pub fn new(name: impl Into<String>, metric_type: MetricType) -> Self {
        Self {
            name: name.into(),
            help: String::new(),
            metric_type,
            values: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn has_labels(&self) -> bool {
        self.values.iter().any(|s| !s.labels.is_empty())
    }

    /// The only sample, when there is exactly one and it carries no labels.
    pub fn single_unlabeled(&self) -> Option<&MetricSample> {
        match self.values.as_slice() {
            [only] if only.labels.is_empty() => Some(only),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricsPayload {
    pub metrics: Vec<CanonicalMetric>,
    pub timestamp: DateTime<Utc>,
}

impl MetricsPayload {
    pub fn new(metrics: Vec<CanonicalMetric>, timestamp: DateTime<Utc>) -> Self {
        Self { metrics, timestamp }
    }
}

/// Parses a sample value, accepting the exposition spellings of infinity and NaN.
pub fn parse_sample_value(raw: &str) -> Option<f64> {
    match raw.trim() {
        "+Inf" | "Inf" | "+inf" | "inf" => Some(f64::INFINITY),
        "-Inf" | "-inf" => Some(f64::NEG_INFINITY),
        "NaN" | "nan" => Some(f64::NAN),
        "" => None,
        other => other.parse::<f64>().ok(),
    }
}

fn missing_value() -> String {
    "0".to_string()
}

fn value_from_string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => "0".to_string(),
        other => other.to_string(),
    })
}

/// Label values from JSON producers are not always strings; numbers and
/// booleans keep their JSON spelling, `null` becomes empty.
fn labels_from_json<'de, D>(deserializer: D) -> std::result::Result<Labels, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let serde_json::Value::Object(entries) = value else {
        return Ok(Labels::new());
    };
    Ok(entries
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                serde_json::Value::String(s) => s,
                serde_json::Value::Null => String::new(),
                other => other.to_string(),
            };
            (key, value)
        })
        .collect())
}

fn string_or_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn type_or_unknown<'de, D>(deserializer: D) -> std::result::Result<MetricType, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s.parse().unwrap_or_default(),
        _ => MetricType::Unknown,
    })
}

fn samples_or_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<MetricSample>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<MetricSample>>::deserialize(deserializer)?.unwrap_or_default())
}
