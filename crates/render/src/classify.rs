use promdash_core::model::CanonicalMetric;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    System,
    Http,
    Business,
    Database,
    Other,
}

impl Category {
    /// Display order of the groups.
    pub const ALL: [Category; 5] = [
        Self::System,
        Self::Http,
        Self::Business,
        Self::Database,
        Self::Other,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Self::System => "System Metrics",
            Self::Http => "HTTP Metrics",
            Self::Business => "Business Metrics",
            Self::Database => "Database Metrics",
            Self::Other => "Other Metrics",
        }
    }

    fn keywords(self) -> &'static [&'static str] {
        match self {
            Self::System => &["memory", "cpu", "process"],
            Self::Http => &["http", "request"],
            Self::Business => &[
                "incidents",
                "service_requests",
                "change_requests",
                "active_sessions",
                "users",
                "tenants",
            ],
            Self::Database => &["db", "database", "query"],
            Self::Other => &[],
        }
    }

    /// Every keyword category is tested independently, so one name can
    /// match several of them. `Other` matches only names no keyword
    /// category claims.
    pub fn matches(self, name: &str) -> bool {
        match self {
            Self::Other => Self::ALL
                .iter()
                .filter(|c| **c != Self::Other)
                .all(|c| !c.matches(name)),
            keyed => keyed.keywords().iter().any(|k| name.contains(k)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricGroup<'a> {
    pub category: Category,
    pub metrics: Vec<&'a CanonicalMetric>,
}

/// Always returns the five groups in display order; empty groups included.
pub fn classify(metrics: &[CanonicalMetric]) -> Vec<MetricGroup<'_>> {
    Category::ALL
        .iter()
        .map(|&category| MetricGroup {
            category,
            metrics: metrics
                .iter()
                .filter(|m| category.matches(&m.name))
                .collect(),
        })
        .collect()
}
