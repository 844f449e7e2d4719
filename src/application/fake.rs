//! Scripted metric source for service tests.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{
    CpuMetrics, Disk, DiskIoCounters, InetConnection, LoadAverage, MemoryMetrics,
    NetworkInterface, NetworkMetrics, OsInfo, Uptime,
};
use crate::ports::{BoxError, MetricSource};

#[derive(Debug, Clone, Default)]
pub struct FakeState {
    pub cpu: CpuMetrics,
    pub memory: MemoryMetrics,
    pub disk: Disk,
    pub disk_io: DiskIoCounters,
    pub interfaces: Vec<NetworkInterface>,
    /// `None` behaves like a permission error
    pub connections: Option<Vec<InetConnection>>,
    pub load: LoadAverage,
    pub uptime: Uptime,
    pub fail_memory: bool,
}

#[derive(Default)]
pub struct FakeSource {
    state: Mutex<FakeState>,
}

impl FakeSource {
    pub fn new(state: FakeState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn update(&self, f: impl FnOnce(&mut FakeState)) {
        f(&mut self.state.lock().unwrap());
    }

    /// Set the counters of an existing interface
    pub fn set_counters(&self, name: &str, metrics: NetworkMetrics) {
        self.update(|state| {
            if let Some(iface) = state.interfaces.iter_mut().find(|i| i.name == name) {
                iface.metrics = metrics;
            }
        });
    }

    fn state(&self) -> FakeState {
        self.state.lock().unwrap().clone()
    }
}

#[async_trait]
impl MetricSource for FakeSource {
    async fn get_hostname(&self) -> Result<String, BoxError> {
        Ok("testhost".into())
    }

    async fn get_cpu_model(&self) -> Result<String, BoxError> {
        Ok("Fake CPU @ 3.00GHz".into())
    }

    async fn get_os_info(&self) -> Result<OsInfo, BoxError> {
        Ok(OsInfo {
            system: "Linux".into(),
            release: "6.1.0".into(),
            distro: "Test Linux".into(),
        })
    }

    async fn get_uptime(&self) -> Result<Uptime, BoxError> {
        Ok(self.state().uptime)
    }

    async fn get_cpu_metrics(&self, _window: Duration) -> Result<CpuMetrics, BoxError> {
        Ok(self.state().cpu)
    }

    async fn get_memory_metrics(&self) -> Result<MemoryMetrics, BoxError> {
        let state = self.state();
        if state.fail_memory {
            return Err("meminfo unavailable".into());
        }
        Ok(state.memory)
    }

    async fn get_load_average(&self) -> Result<LoadAverage, BoxError> {
        Ok(self.state().load)
    }

    async fn get_root_disk(&self) -> Result<Disk, BoxError> {
        Ok(self.state().disk)
    }

    async fn get_disk_io(&self) -> Result<DiskIoCounters, BoxError> {
        Ok(self.state().disk_io)
    }

    async fn list_network_interfaces(&self) -> Result<Vec<NetworkInterface>, BoxError> {
        Ok(self.state().interfaces)
    }

    async fn list_connections(&self) -> Result<Vec<InetConnection>, BoxError> {
        self.state()
            .connections
            .ok_or_else(|| "permission denied".into())
    }
}
