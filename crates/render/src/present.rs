use std::cmp::Ordering;

use promdash_core::model::{CanonicalMetric, Labels, MetricSample, MetricType, parse_sample_value};
use serde::Serialize;

use crate::format::{format_duration, format_sample, format_value};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PresentationSpec {
    Scalar { value: String },
    Gauge { percent: u8 },
    Histogram { buckets: Vec<HistogramBucket> },
    LabelTable { rows: Vec<LabelRow> },
    RawFallback { json: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBucket {
    pub bucket: String,
    pub count: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelRow {
    pub labels: Labels,
    pub value: String,
}

const GAUGE_SUFFIXES: [&str; 2] = ["_percent", "_usage"];
const GAUGE_HINTS: [&str; 3] = ["utilization", "cpu", "memory"];
const BUCKET_LABELS: [&str; 2] = ["le", "bucket"];

/// Picks how one metric is drawn.
pub fn select_presentation(metric: &CanonicalMetric) -> PresentationSpec {
    if let Some(sample) = metric.single_unlabeled() {
        return single_value(metric, sample);
    }

    if metric.values.len() > 1 {
        if metric.metric_type == MetricType::Histogram
            && metric.values.iter().all(|s| bucket_bound(s).is_some())
        {
            return histogram(metric);
        }
        if metric.has_labels() {
            return label_table(metric);
        }
    }

    raw_fallback(&metric.values)
}

fn single_value(metric: &CanonicalMetric, sample: &MetricSample) -> PresentationSpec {
    let Some(value) = sample.numeric_value() else {
        return PresentationSpec::Scalar {
            value: sample.value.clone(),
        };
    };

    if value.is_finite() && is_gauge(&metric.name, value) {
        return PresentationSpec::Gauge {
            percent: value.round().clamp(0.0, 100.0) as u8,
        };
    }

    PresentationSpec::Scalar {
        value: format_value(value, metric),
    }
}

fn is_gauge(name: &str, value: f64) -> bool {
    GAUGE_SUFFIXES.iter().any(|s| name.contains(s))
        || ((0.0..=100.0).contains(&value) && GAUGE_HINTS.iter().any(|h| name.contains(h)))
}

fn bucket_bound(sample: &MetricSample) -> Option<&str> {
    BUCKET_LABELS
        .iter()
        .find_map(|key| sample.labels.get(*key))
        .map(String::as_str)
}

fn histogram(metric: &CanonicalMetric) -> PresentationSpec {
    let mut bounded: Vec<(f64, &str, &MetricSample)> = metric
        .values
        .iter()
        .filter_map(|s| {
            let raw = bucket_bound(s)?;
            Some((parse_sample_value(raw).unwrap_or(f64::NAN), raw, s))
        })
        .collect();
    bounded.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or_else(|| nan_last(a.0, b.0)));

    let buckets = bounded
        .into_iter()
        .map(|(bound, raw, sample)| HistogramBucket {
            bucket: bucket_label(bound, raw),
            count: sample.numeric_value().unwrap_or(0.0),
        })
        .collect();
    PresentationSpec::Histogram { buckets }
}

fn nan_last(a: f64, b: f64) -> Ordering {
    a.is_nan().cmp(&b.is_nan())
}

fn bucket_label(bound: f64, raw: &str) -> String {
    if bound.is_nan() {
        raw.to_string()
    } else if bound == f64::INFINITY {
        "+Inf".to_string()
    } else {
        format_duration(bound)
    }
}

fn label_table(metric: &CanonicalMetric) -> PresentationSpec {
    let rows = metric
        .values
        .iter()
        .map(|s| LabelRow {
            labels: s.labels.clone(),
            value: format_sample(&s.value, metric),
        })
        .collect();
    PresentationSpec::LabelTable { rows }
}

fn raw_fallback(values: &[MetricSample]) -> PresentationSpec {
    PresentationSpec::RawFallback {
        json: serde_json::to_string_pretty(values).unwrap_or_default(),
    }
}
