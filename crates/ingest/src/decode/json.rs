use chrono::{DateTime, Utc};
use promdash_core::model::{CanonicalMetric, Labels, MetricSample, MetricType, MetricsPayload};
use promdash_core::time::parse_payload_timestamp;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

/// Coerces an already-parsed JSON body into the canonical metric list.
///
/// Shapes are tried in order: an object carrying a `metrics` array, a bare
/// array of metrics, then any other object whose top-level keys each become
/// one gauge.
pub fn normalize_json(value: &Value, now: DateTime<Utc>) -> MetricsPayload {
    match value {
        Value::Object(obj) => match obj.get("metrics") {
            Some(Value::Array(items)) => {
                let timestamp = obj
                    .get("timestamp")
                    .and_then(parse_payload_timestamp)
                    .unwrap_or(now);
                MetricsPayload::new(read_metric_list(items), timestamp)
            }
            _ => MetricsPayload::new(synthesize_gauges(obj), now),
        },
        Value::Array(items) => MetricsPayload::new(read_metric_list(items), now),
        _ => MetricsPayload::new(Vec::new(), now),
    }
}

fn read_metric_list(items: &[Value]) -> Vec<CanonicalMetric> {
    items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| {
            let metric = read_metric(item);
            if metric.is_none() {
                debug!(index = i, "skipped metric entry that is not a canonical metric");
            }
            metric
        })
        .collect()
}

fn read_metric(item: &Value) -> Option<CanonicalMetric> {
    let metric = CanonicalMetric::deserialize(item).ok()?;
    (!metric.name.is_empty()).then_some(metric)
}

fn synthesize_gauges(obj: &Map<String, Value>) -> Vec<CanonicalMetric> {
    obj.iter()
        .map(|(key, value)| {
            let mut metric = CanonicalMetric::new(key.clone(), MetricType::Gauge);
            metric.values = match value {
                Value::Array(items) => items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| {
                        MetricSample::new(single_label("index", i.to_string()), stringify(item))
                    })
                    .collect(),
                Value::Object(entries) => entries
                    .iter()
                    .map(|(sub_key, sub_value)| {
                        let value = if sub_value.is_object() || sub_value.is_array() {
                            "1".to_string()
                        } else {
                            stringify(sub_value)
                        };
                        MetricSample::new(single_label("property", sub_key.clone()), value)
                    })
                    .collect(),
                Value::Null => Vec::new(),
                scalar => vec![MetricSample::unlabeled(stringify(scalar))],
            };
            metric
        })
        .collect()
}

fn single_label(key: &str, value: String) -> Labels {
    Labels::from([(key.to_string(), value)])
}

/// Strings are taken verbatim; everything else is rendered as JSON text.
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
