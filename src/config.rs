use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::domain::rate::DEFAULT_MAX_RATE;
use crate::domain::VirtualNicPrefixes;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Optional TOML file, named by `HOSTPULSE_CONFIG`
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub virtual_nic_prefixes: Option<VirtualNicPrefixes>,
    pub collect_interval_secs: Option<u64>,
    pub retention_days: Option<u64>,
    pub max_net_rate: Option<f64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|s| s.parse().ok())
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub collect_interval_secs: u64,
    pub retention_days: u64,
    pub max_net_rate: f64,
    pub db_path: PathBuf,
    pub proc_path: PathBuf,
    pub sys_path: PathBuf,
    pub root_mount: PathBuf,
    pub static_dir: Option<PathBuf>,
    pub log_level: String,
    pub virtual_nic_prefixes: VirtualNicPrefixes,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from a variable lookup; variables win over the config file
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let file = match lookup("HOSTPULSE_CONFIG") {
            Some(path) => FileConfig::load(Path::new(&path))?,
            None => FileConfig::default(),
        };
        let path = |key: &str, default: &str| PathBuf::from(lookup(key).unwrap_or_else(|| default.to_string()));

        Ok(Self {
            port: parse_var(&lookup, "HOSTPULSE_PORT").unwrap_or(8080),
            collect_interval_secs: parse_var(&lookup, "HOSTPULSE_COLLECT_INTERVAL")
                .or(file.collect_interval_secs)
                .unwrap_or(30)
                .max(1),
            retention_days: parse_var(&lookup, "HOSTPULSE_RETENTION_DAYS")
                .or(file.retention_days)
                .unwrap_or(31),
            max_net_rate: parse_var(&lookup, "HOSTPULSE_MAX_NET_RATE")
                .or(file.max_net_rate)
                .unwrap_or(DEFAULT_MAX_RATE),
            db_path: path("HOSTPULSE_DB_PATH", "metrics.db"),
            proc_path: path("HOSTPULSE_PROC_PATH", "/proc"),
            sys_path: path("HOSTPULSE_SYS_PATH", "/sys"),
            root_mount: path("HOSTPULSE_ROOT_MOUNT", "/"),
            static_dir: lookup("HOSTPULSE_STATIC_DIR").map(PathBuf::from),
            log_level: lookup("HOSTPULSE_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            virtual_nic_prefixes: file.virtual_nic_prefixes.unwrap_or_default(),
        })
    }

    pub fn collect_interval(&self) -> Duration {
        Duration::from_secs(self.collect_interval_secs)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_days * 24 * 60 * 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn defaults_without_variables() {
        let config = Config::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.collect_interval(), Duration::from_secs(30));
        assert_eq!(config.retention(), Duration::from_secs(31 * 86_400));
        assert_eq!(config.max_net_rate, 50_000_000.0);
        assert_eq!(config.db_path, PathBuf::from("metrics.db"));
        assert_eq!(config.proc_path, PathBuf::from("/proc"));
        assert!(config.static_dir.is_none());
        assert_eq!(config.virtual_nic_prefixes, VirtualNicPrefixes::default());
    }

    #[test]
    fn variables_override_defaults_and_bad_numbers_are_ignored() {
        let config = Config::from_lookup(lookup(&[
            ("HOSTPULSE_PORT", "9000"),
            ("HOSTPULSE_COLLECT_INTERVAL", "not-a-number"),
            ("HOSTPULSE_PROC_PATH", "/host/proc"),
            ("HOSTPULSE_STATIC_DIR", "/srv/dashboard"),
        ]))
        .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.collect_interval_secs, 30);
        assert_eq!(config.proc_path, PathBuf::from("/host/proc"));
        assert_eq!(config.static_dir, Some(PathBuf::from("/srv/dashboard")));
    }

    #[test]
    fn zero_interval_is_raised_to_one_second() {
        let config = Config::from_lookup(lookup(&[("HOSTPULSE_COLLECT_INTERVAL", "0")])).unwrap();
        assert_eq!(config.collect_interval_secs, 1);
    }

    #[test]
    fn file_values_apply_below_variables() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("hostpulse.toml");
        std::fs::write(
            &path,
            r#"
                virtual_nic_prefixes = ["lo", "cni"]
                collect_interval_secs = 10
                retention_days = 7
            "#,
        )
        .unwrap();
        let path_str = path.to_string_lossy().into_owned();

        let config = Config::from_lookup(lookup(&[
            ("HOSTPULSE_CONFIG", path_str.as_str()),
            ("HOSTPULSE_RETENTION_DAYS", "14"),
        ]))
        .unwrap();

        assert_eq!(config.collect_interval_secs, 10);
        assert_eq!(config.retention_days, 14);
        assert!(config.virtual_nic_prefixes.is_virtual("cni0"));
        assert!(!config.virtual_nic_prefixes.is_virtual("docker0"));
    }

    #[test]
    fn unreadable_or_invalid_file_is_an_error() {
        let missing = Config::from_lookup(lookup(&[("HOSTPULSE_CONFIG", "/nonexistent/hostpulse.toml")]));
        assert!(matches!(missing, Err(ConfigError::Read { .. })));

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "retention_days = \"forever\"").unwrap();
        let path_str = path.to_string_lossy().into_owned();
        let invalid = Config::from_lookup(lookup(&[("HOSTPULSE_CONFIG", path_str.as_str())]));
        assert!(matches!(invalid, Err(ConfigError::Parse { .. })));
    }
}
