use glob::Pattern;

use crate::error::{PromdashError, Result};
use crate::model::CanonicalMetric;

/// Glob over metric names; an empty filter keeps everything.
#[derive(Debug, Clone, Default)]
pub struct NameFilter {
    pattern: Option<Pattern>,
}

impl NameFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(Self::all());
        }
        let pattern = Pattern::new(input)
            .map_err(|e| PromdashError::InvalidArgument(format!("invalid name glob {input}: {e}")))?;
        Ok(Self {
            pattern: Some(pattern),
        })
    }

    pub fn from_option(input: Option<&str>) -> Result<Self> {
        input.map(Self::parse).unwrap_or_else(|| Ok(Self::all()))
    }

    pub fn matches(&self, name: &str) -> bool {
        self.pattern.as_ref().is_none_or(|p| p.matches(name))
    }

    pub fn apply(&self, metrics: Vec<CanonicalMetric>) -> Vec<CanonicalMetric> {
        if self.pattern.is_none() {
            return metrics;
        }
        metrics.into_iter().filter(|m| self.matches(&m.name)).collect()
    }
}
