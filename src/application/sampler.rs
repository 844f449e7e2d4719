use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::read_or_default;
use crate::domain::network::TOTAL_KEY;
use crate::domain::rate::DEFAULT_MAX_RATE;
use crate::domain::{
    count_connections, unavailable_connection_counts, unix_now, DiskRateTracker,
    NetworkInterface, NetworkMetrics, NetworkRateTracker, Sample,
};
use crate::ports::{MetricSource, MetricStore, StoreError};

const DISK_KEY: &str = "disk";

/// Sampler timing and limits
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    pub interval: Duration,
    pub retention: Duration,
    /// Window CPU utilization is measured across
    pub cpu_window: Duration,
    /// Ceiling for default-interface byte rates
    pub max_net_rate: f64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            retention: Duration::from_secs(31 * 24 * 60 * 60),
            cpu_window: Duration::from_secs(1),
            max_net_rate: DEFAULT_MAX_RATE,
        }
    }
}

/// Periodic collector: the only writer of the sample store.
///
/// Owns its rate trackers; ticks never overlap because `run` awaits each
/// one before sleeping.
pub struct Sampler {
    source: Arc<dyn MetricSource>,
    store: Arc<dyn MetricStore>,
    default_nic: String,
    config: SamplerConfig,
    net_tracker: NetworkRateTracker,
    disk_tracker: DiskRateTracker,
}

impl Sampler {
    pub fn new(
        source: Arc<dyn MetricSource>,
        store: Arc<dyn MetricStore>,
        default_nic: impl Into<String>,
        config: SamplerConfig,
    ) -> Self {
        let net_tracker = NetworkRateTracker::with_ceiling(config.max_net_rate);
        Self {
            source,
            store,
            default_nic: default_nic.into(),
            config,
            net_tracker,
            disk_tracker: DiskRateTracker::unbounded(),
        }
    }

    /// Counters of the default interface, or the sum over every interface
    /// when it is gone. The key names which of the two was used, so a
    /// switch restarts the baseline instead of producing a bogus delta.
    fn default_counters(&self, interfaces: &[NetworkInterface]) -> (String, NetworkMetrics) {
        match interfaces.iter().find(|iface| iface.name == self.default_nic) {
            Some(iface) => (iface.name.clone(), iface.metrics),
            None => {
                debug!(nic = %self.default_nic, "Default interface missing, using all interfaces");
                let sum = interfaces
                    .iter()
                    .fold(NetworkMetrics::zero(), |acc, iface| acc.saturating_add(iface.metrics));
                (TOTAL_KEY.to_string(), sum)
            }
        }
    }

    /// Record counter baselines so the first stored sample carries real rates
    pub async fn prime(&mut self, now: f64) {
        let interfaces = read_or_default("network interfaces", self.source.list_network_interfaces().await);
        let (key, counters) = self.default_counters(&interfaces);
        self.net_tracker.update(now, HashMap::from([(key, counters)]));

        if let Ok(io) = self.source.get_disk_io().await {
            self.disk_tracker.update_one(now, DISK_KEY, io);
        }
    }

    /// Read every metric and assemble a sample stamped `now`.
    ///
    /// A failed read zeroes that metric only.
    pub async fn collect_at(&mut self, now: f64) -> Sample {
        let source = Arc::clone(&self.source);

        let cpu = read_or_default("CPU", source.get_cpu_metrics(self.config.cpu_window).await);
        let memory = read_or_default("memory", source.get_memory_metrics().await);
        let disk = read_or_default("root filesystem", source.get_root_disk().await);
        let interfaces = read_or_default("network interfaces", source.list_network_interfaces().await);

        let (key, counters) = self.default_counters(&interfaces);
        let net_rates = self
            .net_tracker
            .update(now, HashMap::from([(key.clone(), counters)]))
            .remove(&key)
            .unwrap_or_default();

        let disk_rates = match source.get_disk_io().await {
            Ok(io) => self.disk_tracker.update_one(now, DISK_KEY, io),
            Err(e) => {
                warn!(error = %e, "Failed to read disk IO");
                Default::default()
            }
        };

        let connections = match source.list_connections().await {
            Ok(conns) => count_connections(&interfaces, &conns),
            Err(e) => {
                warn!(error = %e, "Cannot enumerate connections");
                unavailable_connection_counts()
            }
        };

        Sample::new(now)
            .with_cpu(&cpu)
            .with_memory(&memory)
            .with_disk(&disk)
            .with_network(&counters, &net_rates)
            .with_connections(connections)
            .with_disk_io(&disk_rates)
    }

    /// Collect, persist and evict past retention in one step
    pub async fn tick_at(&mut self, now: f64) -> Result<Sample, StoreError> {
        let sample = self.collect_at(now).await;
        let cutoff = now - self.config.retention.as_secs_f64();

        let evicted = self.store.append_and_evict(&sample, cutoff).await?;
        debug!(timestamp = now, evicted, "Stored sample");

        Ok(sample)
    }

    /// Tick until `cancel` fires. Store failures drop that tick's sample.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            nic = %self.default_nic,
            "Sampler started"
        );
        self.prime(unix_now()).await;

        loop {
            if cancel.is_cancelled() {
                break;
            }

            if let Err(e) = self.tick_at(unix_now()).await {
                error!(error = %e, "Failed to store sample");
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.interval) => {}
            }
        }

        info!("Sampler stopped");
    }
}
