use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::warn;

use super::read_or_default;
use super::snapshot::{
    CpuSnapshot, DefaultNicSnapshot, DiskSnapshot, NicSnapshot, RamSnapshot, Snapshot,
    SwapSnapshot, SystemSnapshot,
};
use crate::domain::{
    count_connections, unavailable_connection_counts, unix_now, DiskRateTracker, HostIdentity,
    InterfaceInfo, NetworkRateTracker, NicClassifier,
};
use crate::ports::{BoxError, MetricSource};

/// CPU measurement window for live reads; short so the request stays fast
const SNAPSHOT_CPU_WINDOW: Duration = Duration::from_millis(100);
const DISK_KEY: &str = "disk";
const LOOPBACK: &str = "lo";

/// Read the facts that stay fixed for the process lifetime
pub async fn detect_identity(source: &dyn MetricSource) -> HostIdentity {
    let unknown = HostIdentity::unknown();
    let hostname = source.get_hostname().await.unwrap_or_else(|e| {
        warn!(error = %e, "Failed to read hostname");
        unknown.hostname.clone()
    });
    let cpu_model = source.get_cpu_model().await.unwrap_or_else(|e| {
        warn!(error = %e, "Failed to read CPU model");
        unknown.cpu_model.clone()
    });
    let os = read_or_default("OS identity", source.get_os_info().await);

    HostIdentity::new(hostname, cpu_model, os)
}

/// Baselines for the live view, separate from the sampler's
struct LiveTrackers {
    network: NetworkRateTracker,
    disk: DiskRateTracker,
}

#[derive(Debug, Clone, Serialize)]
pub struct InterfaceListing {
    pub default: String,
    pub interfaces: Vec<InterfaceInfo>,
}

/// Live, on-demand reads of the host
pub struct MonitoringService {
    source: Arc<dyn MetricSource>,
    identity: HostIdentity,
    classifier: NicClassifier,
    default_nic: String,
    live: Mutex<LiveTrackers>,
}

impl MonitoringService {
    pub fn new(
        source: Arc<dyn MetricSource>,
        identity: HostIdentity,
        classifier: NicClassifier,
        default_nic: impl Into<String>,
    ) -> Self {
        Self {
            source,
            identity,
            classifier,
            default_nic: default_nic.into(),
            live: Mutex::new(LiveTrackers {
                network: NetworkRateTracker::unbounded(),
                disk: DiskRateTracker::unbounded(),
            }),
        }
    }

    pub fn identity(&self) -> &HostIdentity {
        &self.identity
    }

    pub fn default_nic(&self) -> &str {
        &self.default_nic
    }

    /// Interfaces labelled for display
    pub async fn interfaces(&self) -> Result<InterfaceListing, BoxError> {
        let interfaces = self.source.list_network_interfaces().await?;
        Ok(InterfaceListing {
            default: self.default_nic.clone(),
            interfaces: self.classifier.list_interfaces(&interfaces, &self.default_nic),
        })
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.snapshot_with(unix_now).await
    }

    #[cfg(test)]
    pub async fn snapshot_at(&self, now: f64) -> Snapshot {
        self.snapshot_with(move || now).await
    }

    /// Current readings; rates are relative to the previous snapshot call.
    ///
    /// Counters and their timestamp are taken while the trackers are
    /// locked, so concurrent callers advance the baseline in time order.
    async fn snapshot_with(&self, clock: impl FnOnce() -> f64) -> Snapshot {
        let source = &self.source;

        let cpu = read_or_default("CPU", source.get_cpu_metrics(SNAPSHOT_CPU_WINDOW).await);
        let memory = read_or_default("memory", source.get_memory_metrics().await);
        let disk = read_or_default("root filesystem", source.get_root_disk().await);
        let load = read_or_default("load average", source.get_load_average().await);
        let uptime = read_or_default("uptime", source.get_uptime().await);

        let (interfaces, counters, mut nic_rates, disk_rates) = {
            let mut live = self.live.lock().await;
            let interfaces = read_or_default("network interfaces", source.list_network_interfaces().await);
            let disk_io = source.get_disk_io().await;
            let now = clock();

            let counters: HashMap<String, _> = interfaces
                .iter()
                .map(|iface| (iface.name.clone(), iface.metrics))
                .collect();
            let nic_rates = live.network.update(now, counters.clone());
            let disk_rates = match disk_io {
                Ok(io) => live.disk.update_one(now, DISK_KEY, io),
                Err(e) => {
                    warn!(error = %e, "Failed to read disk IO");
                    Default::default()
                }
            };
            (interfaces, counters, nic_rates, disk_rates)
        };

        let connections = match source.list_connections().await {
            Ok(conns) => count_connections(&interfaces, &conns),
            Err(e) => {
                warn!(error = %e, "Cannot enumerate connections");
                unavailable_connection_counts()
            }
        };

        let per_nic: BTreeMap<String, NicSnapshot> = counters
            .iter()
            .filter(|(name, _)| name.as_str() != LOOPBACK)
            .map(|(name, metrics)| {
                let rates = nic_rates.get(name).copied().unwrap_or_default();
                (name.clone(), NicSnapshot::new(metrics, &rates))
            })
            .collect();

        let default_traffic = match (counters.get(&self.default_nic), nic_rates.remove(&self.default_nic)) {
            (Some(metrics), Some(rates)) => NicSnapshot::new(metrics, &rates),
            _ => NicSnapshot::default(),
        };

        Snapshot {
            cpu: CpuSnapshot::new(&self.identity.cpu_model, &cpu),
            ram: RamSnapshot::from(&memory),
            swap: SwapSnapshot::from(&memory.swap),
            disk: DiskSnapshot::new(&disk, &disk_rates),
            network: DefaultNicSnapshot {
                default_nic: self.default_nic.clone(),
                traffic: default_traffic,
            },
            per_nic,
            system: SystemSnapshot::new(uptime.uptime_seconds, &load, self.identity.os.clone()),
            connections,
        }
    }
}
