use chrono::{DateTime, TimeZone, Utc};
use promdash_core::model::{CanonicalMetric, Labels, MetricSample, MetricType, MetricsPayload};

/// Exposition text as served by the ITSM API's metrics endpoint.
pub const EXPOSITION_TEXT: &str = "\
# HELP process_resident_memory_bytes Resident memory size in bytes.
# TYPE process_resident_memory_bytes gauge
process_resident_memory_bytes 52428800
# HELP memory_usage_percent Heap usage as a percentage of the limit.
# TYPE memory_usage_percent gauge
memory_usage_percent 73
# HELP http_requests_total Total HTTP requests.
# TYPE http_requests_total counter
http_requests_total{method=\"GET\",route=\"/api/incidents\"} 1027
http_requests_total{method=\"POST\",route=\"/api/incidents\"} 31
# HELP incidents_open Open incidents across tenants.
# TYPE incidents_open gauge
incidents_open 14
# HELP db_query_duration_seconds Mean query latency.
# TYPE db_query_duration_seconds gauge
db_query_duration_seconds 0.0042
# HELP orphan_metric Has help but never a type line.
orphan_metric 1
";

pub const JSON_CANONICAL: &str = r#"{
  "metrics": [
    {"name": "active_sessions", "help": "Logged-in sessions", "type": "gauge",
     "values": [{"labels": {}, "value": "12"}]},
    {"name": "http_request_duration_seconds", "help": "Request latency", "type": "histogram",
     "values": [
       {"labels": {"le": "0.5"}, "value": "10"},
       {"labels": {"le": "0.1"}, "value": "3"},
       {"labels": {"le": "+Inf"}, "value": "11"}
     ]}
  ],
  "timestamp": "2026-02-01T00:00:00Z"
}"#;

pub const JSON_FLAT: &str = r#"{"cpu_usage": 42, "uptime": 3600, "tenants": {"acme": 3, "globex": 5}}"#;

pub fn fixed_ts() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap()
}

fn sample(labels: &[(&str, &str)], value: &str) -> MetricSample {
    MetricSample::new(
        labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<Labels>(),
        value,
    )
}

fn metric(name: &str, help: &str, kind: MetricType, values: Vec<MetricSample>) -> CanonicalMetric {
    let mut m = CanonicalMetric::new(name, kind);
    m.help = help.to_string();
    m.values = values;
    m
}

/// One metric of every presentation kind, spread across the groups.
pub fn sample_payload() -> MetricsPayload {
    MetricsPayload::new(
        vec![
            metric(
                "memory_usage_percent",
                "Heap usage",
                MetricType::Gauge,
                vec![sample(&[], "73")],
            ),
            metric(
                "process_resident_memory_bytes",
                "Resident memory",
                MetricType::Gauge,
                vec![sample(&[], "52428800")],
            ),
            metric(
                "http_request_duration_seconds",
                "Request latency",
                MetricType::Histogram,
                vec![
                    sample(&[("le", "0.5")], "10"),
                    sample(&[("le", "0.1")], "3"),
                    sample(&[("le", "+Inf")], "11"),
                ],
            ),
            metric(
                "http_requests_total",
                "Requests",
                MetricType::Counter,
                vec![
                    sample(&[("method", "GET")], "1027"),
                    sample(&[("method", "POST")], "31"),
                ],
            ),
            metric(
                "incidents_open",
                "Open incidents",
                MetricType::Gauge,
                vec![sample(&[], "14")],
            ),
            metric("build_info", "", MetricType::Unknown, vec![]),
        ],
        fixed_ts(),
    )
}
