pub mod metric;

pub use metric::{
    CanonicalMetric, Labels, MetricSample, MetricType, MetricsPayload, parse_sample_value,
};
