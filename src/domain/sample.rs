use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::rate::{DiskRates, NetworkRates};
use super::{ConnectionCounts, CpuMetrics, Disk, MemoryMetrics, NetworkMetrics};

pub const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Auxiliary per-tick metrics; the key set only ever grows
pub type Extra = Map<String, Value>;

/// Round to a fixed number of decimal places
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

pub fn bytes_to_gb(bytes: u64) -> f64 {
    round_to(bytes as f64 / BYTES_PER_GB, 2)
}

/// Current wall-clock time as fractional Unix seconds
pub fn unix_now() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// One collection tick. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: f64,
    pub cpu_percent: f64,
    pub ram_percent: f64,
    pub ram_used_gb: f64,
    pub ram_total_gb: f64,
    pub disk_percent: f64,
    pub disk_used_gb: f64,
    pub disk_total_gb: f64,
    pub net_sent_bytes: u64,
    pub net_recv_bytes: u64,
    pub net_sent_rate: f64,
    pub net_recv_rate: f64,
    #[serde(default)]
    pub connections: ConnectionCounts,
    #[serde(default)]
    pub extra: Extra,
}

impl Sample {
    pub fn new(timestamp: f64) -> Self {
        Self {
            timestamp,
            cpu_percent: 0.0,
            ram_percent: 0.0,
            ram_used_gb: 0.0,
            ram_total_gb: 0.0,
            disk_percent: 0.0,
            disk_used_gb: 0.0,
            disk_total_gb: 0.0,
            net_sent_bytes: 0,
            net_recv_bytes: 0,
            net_sent_rate: 0.0,
            net_recv_rate: 0.0,
            connections: ConnectionCounts::new(),
            extra: Extra::new(),
        }
    }

    pub fn with_cpu(mut self, cpu: &CpuMetrics) -> Self {
        self.cpu_percent = round_to(cpu.usage_percent, 1);
        self.extra.insert("cpu_cores".into(), json!(cpu.per_core));
        self
    }

    pub fn with_memory(mut self, memory: &MemoryMetrics) -> Self {
        self.ram_percent = round_to(memory.usage_percent(), 1);
        self.ram_used_gb = bytes_to_gb(memory.used_bytes);
        self.ram_total_gb = bytes_to_gb(memory.total_bytes);
        self.extra.insert("ram_free_gb".into(), json!(bytes_to_gb(memory.free_bytes)));
        self.extra.insert("ram_shared_gb".into(), json!(bytes_to_gb(memory.shared_bytes)));
        self.extra.insert("ram_buff_cache_gb".into(), json!(bytes_to_gb(memory.buff_cache_bytes)));
        self.extra.insert("ram_available_gb".into(), json!(bytes_to_gb(memory.available_bytes)));
        self.extra.insert("swap_used_gb".into(), json!(bytes_to_gb(memory.swap.used_bytes)));
        self.extra.insert("swap_total_gb".into(), json!(bytes_to_gb(memory.swap.total_bytes)));
        self
    }

    pub fn with_disk(mut self, disk: &Disk) -> Self {
        self.disk_percent = round_to(disk.usage_percent(), 1);
        self.disk_used_gb = bytes_to_gb(disk.used_bytes);
        self.disk_total_gb = bytes_to_gb(disk.total_bytes);
        self
    }

    pub fn with_disk_io(mut self, rates: &DiskRates) -> Self {
        self.extra.insert("disk_read_bps".into(), json!(rates.read_bytes.round()));
        self.extra.insert("disk_write_bps".into(), json!(rates.write_bytes.round()));
        self.extra.insert("disk_read_iops".into(), json!(rates.read_ops.round()));
        self.extra.insert("disk_write_iops".into(), json!(rates.write_ops.round()));
        self
    }

    pub fn with_network(mut self, counters: &NetworkMetrics, rates: &NetworkRates) -> Self {
        self.net_sent_bytes = counters.tx_bytes;
        self.net_recv_bytes = counters.rx_bytes;
        self.net_sent_rate = rates.sent_bytes.round();
        self.net_recv_rate = rates.recv_bytes.round();
        self
    }

    pub fn with_connections(mut self, connections: ConnectionCounts) -> Self {
        self.connections = connections;
        self
    }
}
