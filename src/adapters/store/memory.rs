use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;

use crate::domain::Sample;
use crate::ports::{MetricStore, StoreError};

/// In-memory sample log backing the application tests.
///
/// Writers build a new vector when readers still hold the old one
/// (`Arc::make_mut`), so a reader's snapshot never changes under it.
#[derive(Default)]
pub struct MemoryStore {
    samples: RwLock<Arc<Vec<Sample>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot(&self) -> Arc<Vec<Sample>> {
        self.samples
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn write<R>(&self, f: impl FnOnce(&mut Vec<Sample>) -> R) -> R {
        let mut guard = self.samples.write().unwrap_or_else(PoisonError::into_inner);
        f(Arc::make_mut(&mut guard))
    }
}

/// Keeps the log sorted; equal timestamps stay in insertion order
fn insert_sorted(samples: &mut Vec<Sample>, sample: &Sample) {
    let at = samples.partition_point(|s| s.timestamp <= sample.timestamp);
    samples.insert(at, sample.clone());
}

fn evict(samples: &mut Vec<Sample>, cutoff: f64) -> u64 {
    let stale = samples.partition_point(|s| s.timestamp < cutoff);
    samples.drain(..stale);
    stale as u64
}

#[async_trait]
impl MetricStore for MemoryStore {
    async fn append(&self, sample: &Sample) -> Result<(), StoreError> {
        self.write(|samples| insert_sorted(samples, sample));
        Ok(())
    }

    async fn evict_before(&self, cutoff: f64) -> Result<u64, StoreError> {
        Ok(self.write(|samples| evict(samples, cutoff)))
    }

    async fn query_range(&self, from: f64) -> Result<Vec<Sample>, StoreError> {
        let snapshot = self.snapshot();
        let start = snapshot.partition_point(|s| s.timestamp < from);
        Ok(snapshot[start..].to_vec())
    }

    async fn latest(&self) -> Result<Option<Sample>, StoreError> {
        Ok(self.snapshot().last().cloned())
    }

    async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.snapshot().len())
    }

    async fn append_and_evict(&self, sample: &Sample, cutoff: f64) -> Result<u64, StoreError> {
        Ok(self.write(|samples| {
            insert_sorted(samples, sample);
            evict(samples, cutoff)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(timestamp: f64) -> Sample {
        Sample::new(timestamp)
    }

    #[tokio::test]
    async fn query_is_ascending_and_inclusive() {
        let store = MemoryStore::new();
        for t in [30.0, 10.0, 20.0] {
            store.append(&at(t)).await.unwrap();
        }

        let samples = store.query_range(20.0).await.unwrap();
        let stamps: Vec<f64> = samples.iter().map(|s| s.timestamp).collect();
        assert_eq!(stamps, [20.0, 30.0]);
        assert_eq!(store.latest().await.unwrap().unwrap().timestamp, 30.0);
    }

    #[tokio::test]
    async fn eviction_removes_everything_older_than_cutoff() {
        let store = MemoryStore::new();
        for t in [1.0, 2.0, 3.0, 4.0] {
            store.append(&at(t)).await.unwrap();
        }

        assert_eq!(store.evict_before(3.0).await.unwrap(), 2);
        let remaining = store.query_range(f64::MIN).await.unwrap();
        assert!(remaining.iter().all(|s| s.timestamp >= 3.0));
        assert_eq!(store.len().await.unwrap(), 2);
        assert_eq!(store.evict_before(0.0).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn readers_keep_their_snapshot() {
        let store = MemoryStore::new();
        store.append(&at(1.0)).await.unwrap();
        let held = store.snapshot();

        store.append_and_evict(&at(100.0), 50.0).await.unwrap();

        assert_eq!(held.len(), 1);
        assert_eq!(held[0].timestamp, 1.0);
        let now: Vec<f64> = store.query_range(0.0).await.unwrap().iter().map(|s| s.timestamp).collect();
        assert_eq!(now, [100.0]);
    }

    #[tokio::test]
    async fn empty_store() {
        let store = MemoryStore::new();
        assert!(store.is_empty().await.unwrap());
        assert!(store.latest().await.unwrap().is_none());
        assert!(store.query_range(0.0).await.unwrap().is_empty());
    }
}
