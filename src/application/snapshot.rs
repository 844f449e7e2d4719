//! Response shape of the live `/api/current` read.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::{
    bytes_to_gb, round_to, ConnectionCounts, CpuMetrics, Disk, DiskRates, LoadAverage,
    MemoryMetrics, NetworkMetrics, NetworkRates, OsInfo, SwapMetrics,
};

#[derive(Debug, Clone, Serialize)]
pub struct CpuSnapshot {
    pub model: String,
    pub percent: f64,
    pub cores: usize,
    pub freq_mhz: f64,
    pub per_core: Vec<f64>,
}

impl CpuSnapshot {
    pub fn new(model: &str, cpu: &CpuMetrics) -> Self {
        Self {
            model: model.to_string(),
            percent: round_to(cpu.usage_percent, 1),
            cores: cpu.core_count(),
            freq_mhz: cpu.frequency_mhz.map(f64::round).unwrap_or(0.0),
            per_core: cpu.per_core.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RamSnapshot {
    pub percent: f64,
    pub used_gb: f64,
    pub total_gb: f64,
    pub available_gb: f64,
    pub free_gb: f64,
    pub shared_gb: f64,
    pub buff_cache_gb: f64,
}

impl From<&MemoryMetrics> for RamSnapshot {
    fn from(memory: &MemoryMetrics) -> Self {
        Self {
            percent: round_to(memory.usage_percent(), 1),
            used_gb: bytes_to_gb(memory.used_bytes),
            total_gb: bytes_to_gb(memory.total_bytes),
            available_gb: bytes_to_gb(memory.available_bytes),
            free_gb: bytes_to_gb(memory.free_bytes),
            shared_gb: bytes_to_gb(memory.shared_bytes),
            buff_cache_gb: bytes_to_gb(memory.buff_cache_bytes),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SwapSnapshot {
    pub percent: f64,
    pub used_gb: f64,
    pub total_gb: f64,
    pub free_gb: f64,
}

impl From<&SwapMetrics> for SwapSnapshot {
    fn from(swap: &SwapMetrics) -> Self {
        Self {
            percent: round_to(swap.usage_percent(), 1),
            used_gb: bytes_to_gb(swap.used_bytes),
            total_gb: bytes_to_gb(swap.total_bytes),
            free_gb: bytes_to_gb(swap.free_bytes),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DiskSnapshot {
    pub percent: f64,
    pub used_gb: f64,
    pub total_gb: f64,
    pub free_gb: f64,
    pub read_bps: f64,
    pub write_bps: f64,
    pub read_iops: f64,
    pub write_iops: f64,
}

impl DiskSnapshot {
    pub fn new(disk: &Disk, io: &DiskRates) -> Self {
        Self {
            percent: round_to(disk.usage_percent(), 1),
            used_gb: bytes_to_gb(disk.used_bytes),
            total_gb: bytes_to_gb(disk.total_bytes),
            free_gb: bytes_to_gb(disk.available_bytes),
            read_bps: io.read_bytes.round(),
            write_bps: io.write_bytes.round(),
            read_iops: io.read_ops.round(),
            write_iops: io.write_ops.round(),
        }
    }
}

/// Traffic of one interface: bits and packets per second, totals in GB
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NicSnapshot {
    pub sent_bps: f64,
    pub recv_bps: f64,
    pub sent_pps: f64,
    pub recv_pps: f64,
    pub sent_gb: f64,
    pub recv_gb: f64,
}

impl NicSnapshot {
    pub fn new(counters: &NetworkMetrics, rates: &NetworkRates) -> Self {
        Self {
            sent_bps: (rates.sent_bytes * 8.0).round(),
            recv_bps: (rates.recv_bytes * 8.0).round(),
            sent_pps: rates.sent_packets.round(),
            recv_pps: rates.recv_packets.round(),
            sent_gb: bytes_to_gb(counters.tx_bytes),
            recv_gb: bytes_to_gb(counters.rx_bytes),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DefaultNicSnapshot {
    pub default_nic: String,
    #[serde(flatten)]
    pub traffic: NicSnapshot,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemSnapshot {
    pub uptime_seconds: u64,
    pub load_avg_1m: f64,
    pub load_avg_5m: f64,
    pub load_avg_15m: f64,
    pub os: OsInfo,
}

impl SystemSnapshot {
    pub fn new(uptime_seconds: u64, load: &LoadAverage, os: OsInfo) -> Self {
        Self {
            uptime_seconds,
            load_avg_1m: round_to(load.one, 2),
            load_avg_5m: round_to(load.five, 2),
            load_avg_15m: round_to(load.fifteen, 2),
            os,
        }
    }
}

/// Point-in-time view of the host
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub cpu: CpuSnapshot,
    pub ram: RamSnapshot,
    pub swap: SwapSnapshot,
    pub disk: DiskSnapshot,
    pub network: DefaultNicSnapshot,
    /// Every interface except loopback
    pub per_nic: BTreeMap<String, NicSnapshot>,
    pub system: SystemSnapshot,
    pub connections: ConnectionCounts,
}
