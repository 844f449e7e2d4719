use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{
    CpuMetrics, Disk, DiskIoCounters, InetConnection, LoadAverage, MemoryMetrics,
    NetworkInterface, OsInfo, Uptime,
};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Port for reading host resource counters.
///
/// Every call is a single synchronous read of the OS as of call time.
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// Host name
    async fn get_hostname(&self) -> Result<String, BoxError>;

    /// CPU model identifier
    async fn get_cpu_model(&self) -> Result<String, BoxError>;

    /// Kernel and distribution identity
    async fn get_os_info(&self) -> Result<OsInfo, BoxError>;

    /// Seconds since boot
    async fn get_uptime(&self) -> Result<Uptime, BoxError>;

    /// CPU utilization, overall and per core, measured across `window`
    async fn get_cpu_metrics(&self, window: Duration) -> Result<CpuMetrics, BoxError>;

    /// Virtual memory and swap
    async fn get_memory_metrics(&self) -> Result<MemoryMetrics, BoxError>;

    /// System load average
    async fn get_load_average(&self) -> Result<LoadAverage, BoxError>;

    /// Usage of the root filesystem
    async fn get_root_disk(&self) -> Result<Disk, BoxError>;

    /// Cumulative IO counters over all whole disks
    async fn get_disk_io(&self) -> Result<DiskIoCounters, BoxError>;

    /// All interfaces with link state, speed, addresses and counters
    async fn list_network_interfaces(&self) -> Result<Vec<NetworkInterface>, BoxError>;

    /// Open inet sockets (TCP and UDP, v4 and v6)
    async fn list_connections(&self) -> Result<Vec<InetConnection>, BoxError>;
}
