use std::collections::HashMap;
use std::sync::LazyLock;

use promdash_core::model::{CanonicalMetric, Labels, MetricSample, MetricType};
use regex::Regex;

/// Metric name, optional `{...}` label block, optional value token.
static SAMPLE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-zA-Z_:][a-zA-Z0-9_:]*)(?:\{(.*)\})?\s*(\S+)?")
        .expect("sample line pattern is valid")
});

const DEFAULT_VALUE: &str = "0";

/// Line-oriented decoder for the Prometheus text exposition format.
///
/// By default a metric is only emitted once a `# HELP` line is followed by
/// a `# TYPE` line for the same name; sample lines are attached to the most recently
/// committed metric when their name matches it and are dropped otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpositionDecoder {
    commit_untyped: bool,
}

enum Cursor {
    Idle,
    Pending(CanonicalMetric),
    Committed(usize),
}

impl ExpositionDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also emit HELP-only records, typed `unknown`. The record is committed
    /// by its first matching sample line, the next HELP line, or the end of
    /// input, whichever comes first.
    pub fn commit_untyped(mut self, enabled: bool) -> Self {
        self.commit_untyped = enabled;
        self
    }

    pub fn decode(&self, text: &str) -> Vec<CanonicalMetric> {
        let mut out: Vec<CanonicalMetric> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut cursor = Cursor::Idle;

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(rest) = line.strip_prefix("# HELP ") {
                let Some((name, help)) = split_name(rest) else {
                    continue;
                };
                if let Cursor::Pending(prev) = std::mem::replace(&mut cursor, Cursor::Idle) {
                    self.flush_untyped(prev, &mut out, &mut index);
                }
                let mut metric = CanonicalMetric::new(name, MetricType::Unknown);
                metric.help = unescape_help(&help.split_whitespace().collect::<Vec<_>>().join(" "));
                cursor = Cursor::Pending(metric);
                continue;
            }

            if let Some(rest) = line.strip_prefix("# TYPE ") {
                let Some((name, kind)) = split_name(rest) else {
                    continue;
                };
                let metric_type = kind
                    .split_whitespace()
                    .next()
                    .and_then(|k| k.parse::<MetricType>().ok())
                    .unwrap_or_default();
                cursor = match cursor {
                    Cursor::Pending(mut metric) if metric.name == name => {
                        metric.metric_type = metric_type;
                        Cursor::Committed(commit(metric, &mut out, &mut index))
                    }
                    Cursor::Committed(i) if out[i].name == name => {
                        out[i].metric_type = metric_type;
                        Cursor::Committed(i)
                    }
                    other => other,
                };
                continue;
            }

            if line.starts_with('#') {
                continue;
            }

            let Some((name, sample)) = parse_sample_line(line) else {
                continue;
            };
            if self.commit_untyped
                && matches!(&cursor, Cursor::Pending(m) if m.name == name)
                && let Cursor::Pending(metric) = std::mem::replace(&mut cursor, Cursor::Idle)
            {
                cursor = Cursor::Committed(commit(metric, &mut out, &mut index));
            }
            if let Cursor::Committed(i) = cursor
                && out[i].name == name
            {
                out[i].values.push(sample);
            }
        }

        if let Cursor::Pending(prev) = cursor {
            self.flush_untyped(prev, &mut out, &mut index);
        }

        out
    }

    fn flush_untyped(
        &self,
        metric: CanonicalMetric,
        out: &mut Vec<CanonicalMetric>,
        index: &mut HashMap<String, usize>,
    ) {
        if self.commit_untyped {
            commit(metric, out, index);
        }
    }
}

/// Decodes with the default strict policy.
pub fn decode_exposition(text: &str) -> Vec<CanonicalMetric> {
    ExpositionDecoder::new().decode(text)
}

fn commit(
    metric: CanonicalMetric,
    out: &mut Vec<CanonicalMetric>,
    index: &mut HashMap<String, usize>,
) -> usize {
    if let Some(&i) = index.get(&metric.name) {
        out[i].help = metric.help;
        out[i].metric_type = metric.metric_type;
        return i;
    }
    index.insert(metric.name.clone(), out.len());
    out.push(metric);
    out.len() - 1
}

fn split_name(rest: &str) -> Option<(&str, &str)> {
    let rest = rest.trim_start();
    let (name, tail) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    if name.is_empty() {
        return None;
    }
    Some((name, tail.trim()))
}

fn parse_sample_line(line: &str) -> Option<(&str, MetricSample)> {
    let caps = SAMPLE_LINE.captures(line)?;
    let name = caps.get(1)?.as_str();
    let labels = caps
        .get(2)
        .map(|m| parse_labels(m.as_str()))
        .unwrap_or_default();
    let value = caps.get(3).map_or(DEFAULT_VALUE, |m| m.as_str());
    Some((name, MetricSample::new(labels, value)))
}

/// Parses the inside of a `{...}` block. Pairs without `=` are dropped.
pub(crate) fn parse_labels(block: &str) -> Labels {
    let mut labels = Labels::new();
    for pair in split_label_pairs(block) {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        labels.insert(key.to_string(), unquote(value.trim()));
    }
    labels
}

fn split_label_pairs(block: &str) -> Vec<&str> {
    let mut pairs = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in block.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                pairs.push(&block[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    pairs.push(&block[start..]);
    pairs.retain(|p| !p.trim().is_empty());
    pairs
}

fn unquote(raw: &str) -> String {
    let inner = raw
        .strip_prefix('"')
        .map(|s| s.strip_suffix('"').unwrap_or(s))
        .unwrap_or(raw);
    if !inner.contains('\\') {
        return inner.to_string();
    }
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// HELP text only escapes `\\` and `\n`; any other backslash is literal.
fn unescape_help(raw: &str) -> String {
    if !raw.contains('\\') {
        return raw.to_string();
    }
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        match (c, chars.peek().copied()) {
            ('\\', Some('\\')) => {
                chars.next();
                out.push('\\');
            }
            ('\\', Some('n')) => {
                chars.next();
                out.push('\n');
            }
            _ => out.push(c),
        }
    }
    out
}
