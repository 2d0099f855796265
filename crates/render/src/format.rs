//! Display strings for raw sample values.
//!
//! The unit is inferred from the metric name: `_bytes`/`_memory` scale by
//! 1024, `_seconds`/`_duration` pick a time unit, everything else gets a
//! K/M magnitude suffix.

use promdash_core::model::{CanonicalMetric, parse_sample_value};

const BYTE_UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];

pub fn format_value(value: f64, metric: &CanonicalMetric) -> String {
    let name = metric.name.as_str();
    if name.contains("_bytes") || name.contains("_memory") {
        format_bytes(value)
    } else if name.contains("_seconds") || name.contains("_duration") {
        format_duration(value)
    } else {
        format_number(value)
    }
}

/// Formats a raw sample string; values that are not numbers pass through.
pub fn format_sample(raw: &str, metric: &CanonicalMetric) -> String {
    match parse_sample_value(raw) {
        Some(value) => format_value(value, metric),
        None => raw.to_string(),
    }
}

pub fn format_bytes(bytes: f64) -> String {
    if !bytes.is_finite() {
        return format_non_finite(bytes);
    }
    if bytes == 0.0 {
        return "0 Bytes".to_string();
    }
    let mut scaled = bytes;
    let mut unit = 0;
    while scaled >= 1024.0 && unit < BYTE_UNITS.len() - 1 {
        scaled /= 1024.0;
        unit += 1;
    }
    format!("{scaled:.2} {}", BYTE_UNITS[unit])
}

pub fn format_duration(seconds: f64) -> String {
    if !seconds.is_finite() {
        return format_non_finite(seconds);
    }
    if seconds < 0.001 {
        format!("{:.2}µs", seconds * 1_000_000.0)
    } else if seconds < 1.0 {
        format!("{:.2}ms", seconds * 1_000.0)
    } else if seconds < 60.0 {
        format!("{seconds:.2}s")
    } else {
        let minutes = (seconds / 60.0).floor();
        let rest = (seconds % 60.0).floor();
        format!("{minutes}m {rest}s")
    }
}

pub fn format_number(value: f64) -> String {
    if !value.is_finite() {
        return format_non_finite(value);
    }
    if value > 1_000_000.0 {
        format!("{:.2}M", value / 1_000_000.0)
    } else if value > 1_000.0 {
        format!("{:.2}K", value / 1_000.0)
    } else if value.fract() == 0.0 {
        format!("{value}")
    } else {
        format!("{value:.2}")
    }
}

fn format_non_finite(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value > 0.0 {
        "+Inf".to_string()
    } else {
        "-Inf".to_string()
    }
}
