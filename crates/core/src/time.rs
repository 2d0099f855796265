use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::error::{PromdashError, Result};

/// Reads a payload-supplied timestamp: RFC 3339 text or epoch milliseconds.
pub fn parse_payload_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|ts| ts.with_timezone(&Utc))
            .or_else(|| s.trim().parse::<i64>().ok().and_then(from_epoch_millis)),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(from_epoch_millis),
        _ => None,
    }
}

fn from_epoch_millis(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

pub fn parse_duration_str(input: &str) -> Result<Duration> {
    humantime::parse_duration(input)
        .map_err(|e| PromdashError::Parse(format!("invalid duration {input}: {e}")))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_rfc3339() {
        let ts = parse_payload_timestamp(&json!("2026-01-01T00:00:00Z")).unwrap();
        assert_eq!(ts.to_rfc3339(), "2026-01-01T00:00:00+00:00");
    }

    #[test]
    fn parses_epoch_millis() {
        let ts = parse_payload_timestamp(&json!(1_767_225_600_000_i64)).unwrap();
        assert_eq!(ts.to_rfc3339(), "2026-01-01T00:00:00+00:00");
        let from_text = parse_payload_timestamp(&json!("1767225600000")).unwrap();
        assert_eq!(from_text, ts);
    }

    #[test]
    fn rejects_invalid() {
        assert!(parse_payload_timestamp(&json!("yesterday")).is_none());
        assert!(parse_payload_timestamp(&json!(null)).is_none());
        assert!(parse_duration_str("nope").is_err());
        assert_eq!(parse_duration_str("1m").unwrap(), Duration::from_secs(60));
    }
}
