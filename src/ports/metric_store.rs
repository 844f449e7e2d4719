use async_trait::async_trait;
use thiserror::Error;

use crate::domain::Sample;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Invalid payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Port for the time-series log of samples.
///
/// Readers get a consistent snapshot: they never observe half of an
/// append or eviction.
#[async_trait]
pub trait MetricStore: Send + Sync {
    /// Store a new sample
    async fn append(&self, sample: &Sample) -> Result<(), StoreError>;

    /// Delete every sample with `timestamp < cutoff`, returning how many went
    async fn evict_before(&self, cutoff: f64) -> Result<u64, StoreError>;

    /// Samples with `timestamp >= from`, ascending by timestamp
    async fn query_range(&self, from: f64) -> Result<Vec<Sample>, StoreError>;

    /// The most recent sample
    async fn latest(&self) -> Result<Option<Sample>, StoreError>;

    /// Number of stored samples
    async fn len(&self) -> Result<usize, StoreError>;

    /// Append and evict as one unit
    async fn append_and_evict(&self, sample: &Sample, cutoff: f64) -> Result<u64, StoreError> {
        self.append(sample).await?;
        self.evict_before(cutoff).await
    }

    async fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len().await? == 0)
    }
}
