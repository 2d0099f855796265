pub mod classify;
pub mod format;
pub mod present;
pub mod view;

pub use classify::{Category, MetricGroup, classify};
pub use present::{HistogramBucket, LabelRow, PresentationSpec, select_presentation};
pub use view::{GroupView, MetricView, MetricsView, build_view};
