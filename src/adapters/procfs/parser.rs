use std::collections::HashMap;
use std::fs;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::Path;

use thiserror::Error;

use crate::domain::{DiskIoCounters, InetConnection, NetworkMetrics, Transport};

/// Sector size used by /proc/diskstats regardless of the device
const DISKSTATS_SECTOR_BYTES: u64 = 512;

/// IFF_UP from <net/if.h>
const IFF_UP: u32 = 0x1;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Parse /proc/uptime
pub fn parse_uptime(content: &str) -> ParseResult<u64> {
    let parts: Vec<&str> = content.split_whitespace().collect();
    if parts.is_empty() {
        return Err(ParseError::Parse("Empty uptime file".to_string()));
    }

    let uptime_secs = parts[0]
        .parse::<f64>()
        .map_err(|e| ParseError::Parse(format!("Invalid uptime value: {}", e)))?;

    Ok(uptime_secs as u64)
}

/// Parse /proc/loadavg
pub fn parse_loadavg(content: &str) -> ParseResult<(f64, f64, f64)> {
    let parts: Vec<&str> = content.split_whitespace().collect();
    if parts.len() < 3 {
        return Err(ParseError::Parse("Invalid loadavg format".to_string()));
    }

    let one = parts[0]
        .parse::<f64>()
        .map_err(|e| ParseError::Parse(format!("Invalid load 1min: {}", e)))?;
    let five = parts[1]
        .parse::<f64>()
        .map_err(|e| ParseError::Parse(format!("Invalid load 5min: {}", e)))?;
    let fifteen = parts[2]
        .parse::<f64>()
        .map_err(|e| ParseError::Parse(format!("Invalid load 15min: {}", e)))?;

    Ok((one, five, fifteen))
}

/// CPU time counters from one `cpu` line of /proc/stat
#[derive(Debug, Clone, Default)]
pub struct CpuStat {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
}

impl CpuStat {
    pub fn total(&self) -> u64 {
        self.user + self.nice + self.system + self.idle + self.iowait + self.irq + self.softirq + self.steal
    }

    pub fn busy(&self) -> u64 {
        self.total() - self.idle - self.iowait
    }

    /// Busy share of the time elapsed between `previous` and `self`
    pub fn usage_since(&self, previous: &CpuStat) -> f64 {
        let total_delta = self.total().saturating_sub(previous.total());
        if total_delta == 0 {
            return 0.0;
        }
        let busy_delta = self.busy().saturating_sub(previous.busy());
        (busy_delta as f64 / total_delta as f64) * 100.0
    }
}

/// Aggregate and per-core lines of /proc/stat
#[derive(Debug, Clone, Default)]
pub struct CpuTimes {
    pub total: CpuStat,
    pub cores: Vec<CpuStat>,
}

fn parse_cpu_line(line: &str) -> ParseResult<CpuStat> {
    let parts: Vec<&str> = line.split_whitespace().skip(1).collect();
    if parts.len() < 8 {
        return Err(ParseError::Parse("Incomplete cpu stat".to_string()));
    }

    Ok(CpuStat {
        user: parts[0].parse().map_err(|e| ParseError::Parse(format!("user: {}", e)))?,
        nice: parts[1].parse().map_err(|e| ParseError::Parse(format!("nice: {}", e)))?,
        system: parts[2].parse().map_err(|e| ParseError::Parse(format!("system: {}", e)))?,
        idle: parts[3].parse().map_err(|e| ParseError::Parse(format!("idle: {}", e)))?,
        iowait: parts[4].parse().map_err(|e| ParseError::Parse(format!("iowait: {}", e)))?,
        irq: parts[5].parse().map_err(|e| ParseError::Parse(format!("irq: {}", e)))?,
        softirq: parts[6].parse().map_err(|e| ParseError::Parse(format!("softirq: {}", e)))?,
        steal: parts[7].parse().map_err(|e| ParseError::Parse(format!("steal: {}", e)))?,
    })
}

/// Parse the `cpu` and `cpuN` lines of /proc/stat
pub fn parse_cpu_times(content: &str) -> ParseResult<CpuTimes> {
    let mut lines = content.lines();
    let first_line = lines
        .next()
        .ok_or_else(|| ParseError::Parse("Empty stat file".to_string()))?;

    if !first_line.starts_with("cpu ") {
        return Err(ParseError::Parse("Missing cpu line".to_string()));
    }

    let total = parse_cpu_line(first_line)?;
    let cores = lines
        .take_while(|line| line.starts_with("cpu"))
        .map(parse_cpu_line)
        .collect::<ParseResult<Vec<_>>>()?;

    Ok(CpuTimes { total, cores })
}

/// Parse /proc/meminfo into a map
pub fn parse_meminfo(content: &str) -> ParseResult<HashMap<String, u64>> {
    let mut map = HashMap::new();

    for line in content.lines() {
        let parts: Vec<&str> = line.split(':').collect();
        if parts.len() != 2 {
            continue;
        }

        let key = parts[0].trim().to_string();
        let value_str = parts[1].trim().trim_end_matches(" kB");

        if let Ok(value) = value_str.parse::<u64>() {
            map.insert(key, value * 1024); // Convert kB to bytes
        }
    }

    Ok(map)
}

/// CPU model and mean current clock from /proc/cpuinfo
pub fn parse_cpuinfo(content: &str) -> (Option<String>, Option<f64>) {
    let mut model = None;
    let mut clocks = Vec::new();

    for line in content.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        match key.trim() {
            "model name" if model.is_none() => model = Some(value.trim().to_string()),
            "cpu MHz" => {
                if let Ok(mhz) = value.trim().parse::<f64>() {
                    clocks.push(mhz);
                }
            }
            _ => {}
        }
    }

    let mean = (!clocks.is_empty()).then(|| clocks.iter().sum::<f64>() / clocks.len() as f64);
    (model, mean)
}

/// PRETTY_NAME from an os-release file
pub fn parse_os_release(content: &str) -> Option<String> {
    content
        .lines()
        .find_map(|line| line.strip_prefix("PRETTY_NAME="))
        .map(|value| value.trim().trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}

fn read_counter(path: &Path) -> ParseResult<u64> {
    fs::read_to_string(path)?
        .trim()
        .parse::<u64>()
        .map_err(|e| ParseError::Parse(format!("{}: {}", path.display(), e)))
}

/// Parse network statistics from /sys/class/net/{interface}/statistics
pub fn parse_net_stats(stats_dir: &Path) -> ParseResult<NetworkMetrics> {
    Ok(NetworkMetrics::new(
        read_counter(&stats_dir.join("rx_bytes"))?,
        read_counter(&stats_dir.join("tx_bytes"))?,
        read_counter(&stats_dir.join("rx_packets"))?,
        read_counter(&stats_dir.join("tx_packets"))?,
    ))
}

/// Administrative up flag from /sys/class/net/{interface}/flags
pub fn parse_iface_flags(content: &str) -> ParseResult<bool> {
    let raw = content.trim().trim_start_matches("0x");
    let flags = u32::from_str_radix(raw, 16)
        .map_err(|e| ParseError::Parse(format!("flags: {}", e)))?;
    Ok(flags & IFF_UP != 0)
}

/// Link speed from /sys/class/net/{interface}/speed; unknown speeds read as 0
pub fn parse_link_speed(content: &str) -> u32 {
    content.trim().parse::<i64>().ok().filter(|s| *s > 0).map_or(0, |s| s as u32)
}

/// Sum /proc/diskstats over the devices accepted by `is_whole_disk`
pub fn parse_diskstats<F>(content: &str, is_whole_disk: F) -> ParseResult<DiskIoCounters>
where
    F: Fn(&str) -> bool,
{
    let mut counters = DiskIoCounters::default();

    for line in content.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 10 || !is_whole_disk(fields[2]) {
            continue;
        }

        let field = |idx: usize| -> ParseResult<u64> {
            fields[idx]
                .parse::<u64>()
                .map_err(|e| ParseError::Parse(format!("diskstats {}: {}", fields[2], e)))
        };

        counters.read_count += field(3)?;
        counters.read_bytes += field(5)? * DISKSTATS_SECTOR_BYTES;
        counters.write_count += field(7)?;
        counters.write_bytes += field(9)? * DISKSTATS_SECTOR_BYTES;
    }

    Ok(counters)
}

/// Decode a hex address as printed in /proc/net/{tcp,udp}[6].
///
/// The kernel prints each 32-bit word of the address in host byte order.
fn parse_hex_address(hex: &str) -> ParseResult<IpAddr> {
    let word = |chunk: &str| -> ParseResult<[u8; 4]> {
        u32::from_str_radix(chunk, 16)
            .map(u32::to_ne_bytes)
            .map_err(|e| ParseError::Parse(format!("address {}: {}", hex, e)))
    };

    match hex.len() {
        8 => Ok(IpAddr::V4(Ipv4Addr::from(word(hex)?))),
        32 => {
            let mut octets = [0u8; 16];
            for (i, out) in octets.chunks_mut(4).enumerate() {
                out.copy_from_slice(&word(&hex[i * 8..i * 8 + 8])?);
            }
            Ok(IpAddr::V6(Ipv6Addr::from(octets)))
        }
        _ => Err(ParseError::Parse(format!("Unexpected address length: {}", hex))),
    }
}

/// Parse the socket table of /proc/net/{tcp,tcp6,udp,udp6}
pub fn parse_proc_net(content: &str, transport: Transport) -> ParseResult<Vec<InetConnection>> {
    let mut connections = Vec::new();

    for line in content.lines().skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 {
            continue;
        }

        let (addr, _port) = fields[1]
            .split_once(':')
            .ok_or_else(|| ParseError::Parse(format!("Invalid local address: {}", fields[1])))?;

        connections.push(InetConnection::new(parse_hex_address(addr)?, transport));
    }

    Ok(connections)
}
