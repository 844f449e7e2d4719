use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use nix::ifaddrs::getifaddrs;
use tracing::debug;

use crate::domain::{
    CpuMetrics, Disk, DiskIoCounters, InetConnection, InterfaceAddress, LoadAverage,
    MemoryMetrics, NetworkInterface, OsInfo, SwapMetrics, Transport, Uptime,
};
use crate::ports::{BoxError, MetricSource};

use super::parser::{self, CpuTimes};
use super::ProcfsConfig;

const OS_RELEASE_PATHS: &[&str] = &["/etc/os-release", "/usr/lib/os-release"];

/// Metric source implementation using procfs and sysfs
pub struct ProcfsSystemSource {
    config: ProcfsConfig,
}

impl ProcfsSystemSource {
    pub fn new(config: ProcfsConfig) -> Self {
        Self { config }
    }

    fn read_proc(&self, name: &str) -> Result<String, BoxError> {
        Ok(fs::read_to_string(self.config.proc_path.join(name))?)
    }

    fn read_cpu_times(&self) -> Result<CpuTimes, BoxError> {
        Ok(parser::parse_cpu_times(&self.read_proc("stat")?)?)
    }

    fn calculate_cpu_metrics(&self, previous: &CpuTimes, current: &CpuTimes) -> CpuMetrics {
        let per_core = current
            .cores
            .iter()
            .zip(&previous.cores)
            .map(|(now, before)| now.usage_since(before))
            .collect();

        CpuMetrics::new(current.total.usage_since(&previous.total)).with_per_core(per_core)
    }

    /// Up flag from `flags`, falling back to `operstate` when it is missing or unparsable
    fn interface_is_up(path: &Path) -> bool {
        if let Some(up) = fs::read_to_string(path.join("flags"))
            .ok()
            .and_then(|flags| parser::parse_iface_flags(&flags).ok())
        {
            return up;
        }
        fs::read_to_string(path.join("operstate"))
            .map(|s| s.trim() == "up")
            .unwrap_or(false)
    }

    /// Devices listed under /sys/block are whole disks; partitions are not
    fn is_whole_disk(&self, name: &str) -> bool {
        self.config.sys_path.join("block").join(name).exists()
    }

    fn interface_addresses(&self) -> Result<HashMap<String, Vec<InterfaceAddress>>, BoxError> {
        let mut by_name: HashMap<String, Vec<InterfaceAddress>> = HashMap::new();

        for ifaddr in getifaddrs()? {
            let Some(address) = ifaddr.address else {
                continue;
            };
            let ip = if let Some(v4) = address.as_sockaddr_in() {
                IpAddr::V4(v4.ip())
            } else if let Some(v6) = address.as_sockaddr_in6() {
                IpAddr::V6(v6.ip())
            } else {
                continue;
            };
            by_name
                .entry(ifaddr.interface_name)
                .or_default()
                .push(InterfaceAddress::from(ip));
        }

        Ok(by_name)
    }

    fn read_socket_table(
        &self,
        name: &str,
        transport: Transport,
        optional: bool,
    ) -> Result<Vec<InetConnection>, BoxError> {
        match fs::read_to_string(self.config.proc_path.join("net").join(name)) {
            Ok(content) => Ok(parser::parse_proc_net(&content, transport)?),
            // IPv6 may be compiled out
            Err(e) if optional && e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl MetricSource for ProcfsSystemSource {
    async fn get_hostname(&self) -> Result<String, BoxError> {
        Ok(self.read_proc("sys/kernel/hostname")?.trim().to_string())
    }

    async fn get_cpu_model(&self) -> Result<String, BoxError> {
        let (model, _) = parser::parse_cpuinfo(&self.read_proc("cpuinfo")?);
        Ok(model.unwrap_or_else(|| "Unknown CPU".to_string()))
    }

    async fn get_os_info(&self) -> Result<OsInfo, BoxError> {
        let system = self.read_proc("sys/kernel/ostype")?.trim().to_string();
        let release = self.read_proc("sys/kernel/osrelease")?.trim().to_string();
        let distro = OS_RELEASE_PATHS
            .iter()
            .filter_map(|path| fs::read_to_string(path).ok())
            .find_map(|content| parser::parse_os_release(&content))
            .unwrap_or_else(|| format!("{} {}", system, release));

        Ok(OsInfo {
            system,
            release,
            distro,
        })
    }

    async fn get_uptime(&self) -> Result<Uptime, BoxError> {
        let uptime_seconds = parser::parse_uptime(&self.read_proc("uptime")?)?;

        Ok(Uptime { uptime_seconds })
    }

    async fn get_cpu_metrics(&self, window: Duration) -> Result<CpuMetrics, BoxError> {
        let before = self.read_cpu_times()?;
        tokio::time::sleep(window).await;
        let after = self.read_cpu_times()?;

        let frequency = self
            .read_proc("cpuinfo")
            .ok()
            .and_then(|content| parser::parse_cpuinfo(&content).1);

        Ok(self.calculate_cpu_metrics(&before, &after).with_frequency(frequency))
    }

    async fn get_memory_metrics(&self) -> Result<MemoryMetrics, BoxError> {
        let meminfo = parser::parse_meminfo(&self.read_proc("meminfo")?)?;
        let field = |key: &str| meminfo.get(key).copied().unwrap_or(0);

        let total = field("MemTotal");
        let free = field("MemFree");
        let buffers = field("Buffers");
        let cached = field("Cached") + field("SReclaimable");
        let available = meminfo
            .get("MemAvailable")
            .copied()
            .unwrap_or(free + buffers + cached);
        let used = total.saturating_sub(available);

        Ok(MemoryMetrics::new(used, total, available)
            .with_free(free, field("Shmem"))
            .with_cache(buffers + cached)
            .with_swap(SwapMetrics::new(field("SwapTotal"), field("SwapFree"))))
    }

    async fn get_load_average(&self) -> Result<LoadAverage, BoxError> {
        let (one, five, fifteen) = parser::parse_loadavg(&self.read_proc("loadavg")?)?;

        Ok(LoadAverage::new(one, five, fifteen))
    }

    async fn get_root_disk(&self) -> Result<Disk, BoxError> {
        let stat = nix::sys::statvfs::statvfs(self.config.root_mount.as_path())?;
        let block_size = stat.fragment_size() as u64;
        let total_bytes = stat.blocks() as u64 * block_size;
        let available_bytes = stat.blocks_available() as u64 * block_size;
        let free_bytes = stat.blocks_free() as u64 * block_size;
        let used_bytes = total_bytes.saturating_sub(free_bytes);

        Ok(Disk::new(total_bytes, used_bytes, available_bytes))
    }

    async fn get_disk_io(&self) -> Result<DiskIoCounters, BoxError> {
        let content = self.read_proc("diskstats")?;
        Ok(parser::parse_diskstats(&content, |name| self.is_whole_disk(name))?)
    }

    async fn list_network_interfaces(&self) -> Result<Vec<NetworkInterface>, BoxError> {
        let net_class_path = self.config.sys_path.join("class/net");
        let mut addresses = self.interface_addresses().unwrap_or_else(|e| {
            debug!("Interface addresses unavailable: {}", e);
            HashMap::new()
        });
        let mut interfaces = Vec::new();

        for entry in fs::read_dir(&net_class_path)? {
            let entry = entry?;
            let interface_name = entry.file_name().to_string_lossy().to_string();
            let path = entry.path();

            let is_up = Self::interface_is_up(&path);
            let speed = fs::read_to_string(path.join("speed"))
                .map(|s| parser::parse_link_speed(&s))
                .unwrap_or(0);

            match parser::parse_net_stats(&path.join("statistics")) {
                Ok(metrics) => {
                    let addrs = addresses.remove(&interface_name).unwrap_or_default();
                    interfaces.push(
                        NetworkInterface::new(interface_name, is_up, metrics)
                            .with_speed(speed)
                            .with_addresses(addrs),
                    );
                }
                Err(e) => debug!("Skipping interface {}: {}", interface_name, e),
            }
        }

        Ok(interfaces)
    }

    async fn list_connections(&self) -> Result<Vec<InetConnection>, BoxError> {
        let mut connections = self.read_socket_table("tcp", Transport::Tcp, false)?;
        connections.extend(self.read_socket_table("tcp6", Transport::Tcp, true)?);
        connections.extend(self.read_socket_table("udp", Transport::Udp, false)?);
        connections.extend(self.read_socket_table("udp6", Transport::Udp, true)?);

        Ok(connections)
    }
}
