mod monitoring;
mod query;
mod sampler;
mod snapshot;

#[cfg(test)]
pub(crate) mod fake;

pub use monitoring::{detect_identity, InterfaceListing, MonitoringService};
pub use query::{aggregate, MetricPoint, QueryEngine, RangeKey, RangePolicy, RangeReport, RangeTotals, Resolution};
pub use sampler::{Sampler, SamplerConfig};
pub use snapshot::Snapshot;

use tracing::warn;

use crate::ports::BoxError;

/// Unwrap a source read, logging the failure and falling back to the
/// metric's zero value
pub(crate) fn read_or_default<T: Default>(what: &str, result: Result<T, BoxError>) -> T {
    result.unwrap_or_else(|e| {
        warn!(error = %e, "Failed to read {}", what);
        T::default()
    })
}
