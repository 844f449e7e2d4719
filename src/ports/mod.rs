pub mod metric_source;
pub mod metric_store;

pub use metric_source::{BoxError, MetricSource};
pub use metric_store::{MetricStore, StoreError};
