use serde::{Deserialize, Serialize};

/// Filesystem usage of the root mount
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Disk {
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub available_bytes: u64,
}

impl Disk {
    pub fn new(total_bytes: u64, used_bytes: u64, available_bytes: u64) -> Self {
        Self {
            total_bytes,
            used_bytes,
            available_bytes,
        }
    }

    /// Percentage of the space usable by unprivileged users that is taken.
    ///
    /// Reserved root blocks are excluded from the denominator, so a full
    /// disk reads 100 even though `used_bytes < total_bytes`.
    pub fn usage_percent(&self) -> f64 {
        let usable = self.used_bytes + self.available_bytes;
        if usable == 0 {
            return 0.0;
        }
        (self.used_bytes as f64 / usable as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_ignores_reserved_blocks() {
        let disk = Disk::new(100, 45, 45);
        assert_eq!(disk.usage_percent(), 50.0);
    }

    #[test]
    fn empty_disk_reads_zero() {
        assert_eq!(Disk::default().usage_percent(), 0.0);
    }
}
