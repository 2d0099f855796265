use std::fmt::Write;

use promdash_core::model::{CanonicalMetric, Labels};

/// Renders canonical metrics back into exposition text.
pub fn encode_exposition(metrics: &[CanonicalMetric]) -> String {
    let mut out = String::new();
    for metric in metrics {
        let _ = writeln!(out, "# HELP {} {}", metric.name, escape_help(&metric.help));
        let _ = writeln!(out, "# TYPE {} {}", metric.name, metric.metric_type);
        for sample in &metric.values {
            out.push_str(&metric.name);
            write_labels(&mut out, &sample.labels);
            let _ = writeln!(out, " {}", sample.value);
        }
    }
    out
}

fn write_labels(out: &mut String, labels: &Labels) {
    if labels.is_empty() {
        return;
    }
    out.push('{');
    for (i, (key, value)) in labels.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        let _ = write!(out, "{key}=\"{}\"", escape_label_value(value));
    }
    out.push('}');
}

fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn escape_help(help: &str) -> String {
    help.replace('\\', "\\\\").replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use promdash_core::model::{MetricSample, MetricType};

    use super::*;
    use crate::decode::exposition::decode_exposition;

    fn tuples(metrics: &[CanonicalMetric]) -> Vec<(String, Labels, String)> {
        metrics
            .iter()
            .flat_map(|m| {
                m.values
                    .iter()
                    .map(|s| (m.name.clone(), s.labels.clone(), s.value.clone()))
            })
            .collect()
    }

    #[test]
    fn decode_encode_decode_preserves_samples() {
        let text = "\
# HELP http_requests_total Total requests.
# TYPE http_requests_total counter
http_requests_total{route=\"/api/assets\",method=\"GET\"} 12
http_requests_total{method=\"POST\",route=\"/api/assets\"} 2
# HELP db_query_duration_seconds Query latency.
# TYPE db_query_duration_seconds gauge
db_query_duration_seconds{query=\"select \\\"x\\\", y\"} 0.004
";
        let first = decode_exposition(text);
        let second = decode_exposition(&encode_exposition(&first));
        assert_eq!(tuples(&first), tuples(&second));
        assert_eq!(first, second);
    }

    #[test]
    fn help_with_backslash_and_newline_survives_reencoding() {
        let mut metric = CanonicalMetric::new("disk_bytes", MetricType::Gauge);
        metric.help = "Usage of C:\\data\nper volume".to_string();
        metric.values.push(MetricSample::unlabeled("1"));

        let text = encode_exposition(std::slice::from_ref(&metric));
        assert!(text.starts_with("# HELP disk_bytes Usage of C:\\\\data\\nper volume\n"));
        assert_eq!(decode_exposition(&text), vec![metric]);
    }

    #[test]
    fn encodes_sorted_labels() {
        let mut metric = CanonicalMetric::new("up", MetricType::Gauge);
        metric.help = "Target up.".to_string();
        metric.values.push(MetricSample::new(
            Labels::from([
                ("job".to_string(), "api".to_string()),
                ("instance".to_string(), "a:1".to_string()),
            ]),
            "1",
        ));
        assert_eq!(
            encode_exposition(&[metric]),
            "# HELP up Target up.\n# TYPE up gauge\nup{instance=\"a:1\",job=\"api\"} 1\n"
        );
    }
}
