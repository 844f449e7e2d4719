use serde::{Deserialize, Serialize};

/// CPU utilization measured over a short window
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CpuMetrics {
    pub usage_percent: f64,
    pub per_core: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_mhz: Option<f64>,
}

impl CpuMetrics {
    pub fn new(usage_percent: f64) -> Self {
        Self {
            usage_percent,
            ..Default::default()
        }
    }

    pub fn with_per_core(mut self, per_core: Vec<f64>) -> Self {
        self.per_core = per_core;
        self
    }

    pub fn with_frequency(mut self, frequency_mhz: Option<f64>) -> Self {
        self.frequency_mhz = frequency_mhz;
        self
    }

    pub fn core_count(&self) -> usize {
        self.per_core.len()
    }
}

/// Swap usage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SwapMetrics {
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub free_bytes: u64,
}

impl SwapMetrics {
    pub fn new(total_bytes: u64, free_bytes: u64) -> Self {
        Self {
            total_bytes,
            used_bytes: total_bytes.saturating_sub(free_bytes),
            free_bytes,
        }
    }

    pub fn usage_percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        (self.used_bytes as f64 / self.total_bytes as f64) * 100.0
    }
}

/// Virtual memory metrics for the host
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryMetrics {
    pub used_bytes: u64,
    pub total_bytes: u64,
    pub available_bytes: u64,
    pub free_bytes: u64,
    pub shared_bytes: u64,
    /// Buffers plus page cache
    pub buff_cache_bytes: u64,
    pub swap: SwapMetrics,
}

impl MemoryMetrics {
    pub fn new(used_bytes: u64, total_bytes: u64, available_bytes: u64) -> Self {
        Self {
            used_bytes,
            total_bytes,
            available_bytes,
            ..Default::default()
        }
    }

    pub fn with_free(mut self, free_bytes: u64, shared_bytes: u64) -> Self {
        self.free_bytes = free_bytes;
        self.shared_bytes = shared_bytes;
        self
    }

    pub fn with_cache(mut self, buff_cache_bytes: u64) -> Self {
        self.buff_cache_bytes = buff_cache_bytes;
        self
    }

    pub fn with_swap(mut self, swap: SwapMetrics) -> Self {
        self.swap = swap;
        self
    }

    pub fn usage_percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        (self.used_bytes as f64 / self.total_bytes as f64) * 100.0
    }
}

/// Cumulative block device counters, summed over whole disks
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DiskIoCounters {
    pub read_bytes: u64,
    pub write_bytes: u64,
    pub read_count: u64,
    pub write_count: u64,
}

impl DiskIoCounters {
    pub fn new(read_bytes: u64, write_bytes: u64, read_count: u64, write_count: u64) -> Self {
        Self {
            read_bytes,
            write_bytes,
            read_count,
            write_count,
        }
    }
}

/// Cumulative interface counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkMetrics {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub rx_packets: u64,
    pub tx_packets: u64,
}

impl NetworkMetrics {
    pub fn new(rx_bytes: u64, tx_bytes: u64, rx_packets: u64, tx_packets: u64) -> Self {
        Self {
            rx_bytes,
            tx_bytes,
            rx_packets,
            tx_packets,
        }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    /// Element-wise sum, used when the default interface has vanished
    pub fn saturating_add(self, other: Self) -> Self {
        Self {
            rx_bytes: self.rx_bytes.saturating_add(other.rx_bytes),
            tx_bytes: self.tx_bytes.saturating_add(other.tx_bytes),
            rx_packets: self.rx_packets.saturating_add(other.rx_packets),
            tx_packets: self.tx_packets.saturating_add(other.tx_packets),
        }
    }
}

/// System load average (1, 5, 15 minutes)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadAverage {
    pub one: f64,
    pub five: f64,
    pub fifteen: f64,
}

impl LoadAverage {
    pub fn new(one: f64, five: f64, fifteen: f64) -> Self {
        Self { one, five, fifteen }
    }
}
