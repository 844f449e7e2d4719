mod parser;
mod system;

use std::path::PathBuf;

pub use system::ProcfsSystemSource;

/// Where to find procfs and sysfs, e.g. `/host/proc` when run in a container
#[derive(Debug, Clone)]
pub struct ProcfsConfig {
    pub proc_path: PathBuf,
    pub sys_path: PathBuf,
    /// Mount point whose usage is reported as "the disk"
    pub root_mount: PathBuf,
}

impl ProcfsConfig {
    pub fn new(proc_path: impl Into<PathBuf>, sys_path: impl Into<PathBuf>) -> Self {
        Self {
            proc_path: proc_path.into(),
            sys_path: sys_path.into(),
            root_mount: PathBuf::from("/"),
        }
    }

    pub fn with_root_mount(mut self, root_mount: impl Into<PathBuf>) -> Self {
        self.root_mount = root_mount.into();
        self
    }
}
