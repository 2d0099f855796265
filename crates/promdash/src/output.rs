use std::fmt::Write as _;

use chrono::SecondsFormat;
use owo_colors::OwoColorize;
use promdash_core::model::Labels;
use promdash_ingest::poller::Snapshot;
use promdash_render::{MetricView, MetricsView, PresentationSpec, build_view};

const GAUGE_WIDTH: usize = 20;

pub fn print_view_human(view: &MetricsView) {
    print!("{}", render_view(view));
}

pub fn print_snapshot_human(snapshot: &Snapshot) {
    let polled = snapshot
        .polled_at
        .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| "-".to_string());
    println!(
        "{} poll={} at={}",
        "--".bright_black(),
        snapshot.sequence,
        polled
    );
    if let Some(err) = &snapshot.error {
        println!("{} {}", "ERROR".red(), err);
    }
    match &snapshot.payload {
        Some(payload) => print_view_human(&build_view(payload)),
        None => println!("no metrics yet"),
    }
}

pub fn render_view(view: &MetricsView) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "metrics at {}",
        view.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
    );
    let mut shown = 0;
    for group in view.non_empty_groups() {
        let _ = writeln!(
            out,
            "\n{} ({})",
            group.title.bold(),
            group.metrics.len()
        );
        for metric in &group.metrics {
            render_metric(&mut out, metric);
        }
        shown += 1;
    }
    if shown == 0 {
        let _ = writeln!(out, "\nno metrics");
    }
    out
}

fn render_metric(out: &mut String, metric: &MetricView) {
    if metric.help.is_empty() {
        let _ = writeln!(out, "  {} [{}]", metric.name.cyan(), metric.metric_type);
    } else {
        let _ = writeln!(
            out,
            "  {} [{}] {}",
            metric.name.cyan(),
            metric.metric_type,
            metric.help.bright_black()
        );
    }

    match &metric.presentation {
        PresentationSpec::Scalar { value } => {
            let _ = writeln!(out, "    {value}");
        }
        PresentationSpec::Gauge { percent } => {
            let _ = writeln!(out, "    {} {percent}%", gauge_bar(*percent));
        }
        PresentationSpec::Histogram { buckets } => {
            for b in buckets {
                let _ = writeln!(out, "    le {:>10}  {}", b.bucket, b.count);
            }
        }
        PresentationSpec::LabelTable { rows } => {
            for row in rows {
                let _ = writeln!(out, "    {}  {}", label_text(&row.labels), row.value);
            }
        }
        PresentationSpec::RawFallback { json } => {
            for line in json.lines() {
                let _ = writeln!(out, "    {line}");
            }
        }
    }
}

fn gauge_bar(percent: u8) -> String {
    let filled = usize::from(percent) * GAUGE_WIDTH / 100;
    format!(
        "[{}{}]",
        "#".repeat(filled),
        " ".repeat(GAUGE_WIDTH - filled)
    )
}

fn label_text(labels: &Labels) -> String {
    if labels.is_empty() {
        return "{}".to_string();
    }
    labels
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gauge_bar_scales_to_width() {
        assert_eq!(gauge_bar(0), format!("[{}]", " ".repeat(GAUGE_WIDTH)));
        assert_eq!(gauge_bar(100), format!("[{}]", "#".repeat(GAUGE_WIDTH)));
        assert_eq!(gauge_bar(50).matches('#').count(), GAUGE_WIDTH / 2);
    }

    #[test]
    fn label_text_is_sorted_pairs() {
        let labels: Labels = [("route", "/api"), ("method", "GET")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert_eq!(label_text(&labels), "method=GET route=/api");
        assert_eq!(label_text(&Labels::new()), "{}");
    }

    #[test]
    fn render_skips_empty_groups() {
        let view = build_view(&testkit::sample_payload());
        let text = render_view(&view);
        assert!(text.contains("System Metrics"));
        assert!(text.contains("73%"));
        assert!(text.contains("method=GET"));
        assert!(text.contains("+Inf"));
        assert!(!text.contains("Database Metrics"));
    }
}
