pub mod disk;
pub mod host;
pub mod metrics;
pub mod network;
pub mod nic;
pub mod rate;
pub mod sample;

pub use disk::Disk;
pub use host::{HostIdentity, OsInfo, Uptime};
pub use metrics::{CpuMetrics, DiskIoCounters, LoadAverage, MemoryMetrics, NetworkMetrics, SwapMetrics};
pub use network::{
    count_connections, unavailable_connection_counts, AddressFamily, ConnectionCount,
    ConnectionCounts, InetConnection, InterfaceAddress, NetworkInterface, Transport,
};
pub use nic::{InterfaceInfo, NicClassifier, VirtualNicPrefixes};
pub use rate::{DiskRateTracker, DiskRates, NetworkRateTracker, NetworkRates, RateLimit};
pub use sample::{bytes_to_gb, round_to, unix_now, Sample};
