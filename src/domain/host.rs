use serde::{Deserialize, Serialize};

/// Operating system identity
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OsInfo {
    /// Kernel name, e.g. `Linux`
    pub system: String,
    /// Kernel release
    pub release: String,
    /// Human readable distribution name
    pub distro: String,
}

/// Facts about the host that do not change while the process runs.
///
/// Detected once at startup and handed out read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostIdentity {
    pub hostname: String,
    pub cpu_model: String,
    pub os: OsInfo,
}

impl HostIdentity {
    pub fn new(hostname: String, cpu_model: String, os: OsInfo) -> Self {
        Self {
            hostname,
            cpu_model,
            os,
        }
    }

    pub fn unknown() -> Self {
        Self::new("unknown".into(), "Unknown CPU".into(), OsInfo::default())
    }
}

/// Seconds since boot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Uptime {
    pub uptime_seconds: u64,
}
