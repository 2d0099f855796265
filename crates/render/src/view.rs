use chrono::{DateTime, Utc};
use promdash_core::model::{MetricType, MetricsPayload};
use serde::Serialize;

use crate::classify::{Category, classify};
use crate::present::{PresentationSpec, select_presentation};

/// Render-ready model: the classified groups with a presentation per metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsView {
    pub timestamp: DateTime<Utc>,
    pub groups: Vec<GroupView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupView {
    pub category: Category,
    pub title: &'static str,
    pub metrics: Vec<MetricView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricView {
    pub name: String,
    pub help: String,
    #[serde(rename = "type")]
    pub metric_type: MetricType,
    pub presentation: PresentationSpec,
}

impl MetricsView {
    pub fn non_empty_groups(&self) -> impl Iterator<Item = &GroupView> {
        self.groups.iter().filter(|g| !g.metrics.is_empty())
    }
}

pub fn build_view(payload: &MetricsPayload) -> MetricsView {
    let groups = classify(&payload.metrics)
        .into_iter()
        .map(|group| GroupView {
            category: group.category,
            title: group.category.title(),
            metrics: group
                .metrics
                .into_iter()
                .map(|metric| MetricView {
                    name: metric.name.clone(),
                    help: metric.help.clone(),
                    metric_type: metric.metric_type,
                    presentation: select_presentation(metric),
                })
                .collect(),
        })
        .collect();

    MetricsView {
        timestamp: payload.timestamp,
        groups,
    }
}
