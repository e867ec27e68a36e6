//! Configuration management for RSCN Drivers.
//!
//! Loads the user's config file if present, else
//! /etc/rscn-drivers/config.toml, else falls back to defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::error::ConfigError;

/// System-wide config file path
pub const SYSTEM_CONFIG_PATH: &str = "/etc/rscn-drivers/config.toml";

/// Directory name under the user's config dir
pub const CONFIG_DIR_NAME: &str = "rscn-drivers";

/// Complete configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scan: ScanConfig,

    #[serde(default)]
    pub packages: PackageConfig,

    #[serde(default)]
    pub operations: OperationConfig,
}

/// Hardware scan settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// lspci timeout in seconds
    #[serde(default = "default_scan_timeout")]
    pub timeout_secs: u64,
}

fn default_scan_timeout() -> u64 {
    5
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_scan_timeout(),
        }
    }
}

impl ScanConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Package query settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageConfig {
    /// Timeout for pacman/which queries in seconds
    #[serde(default = "default_query_timeout")]
    pub query_timeout_secs: u64,

    /// Timeout for the default-route check in seconds
    #[serde(default = "default_network_timeout")]
    pub network_timeout_secs: u64,

    /// pacman database lock file
    #[serde(default = "default_lock_file")]
    pub lock_file: PathBuf,

    /// mkinitcpio configuration scanned for the kms hook
    #[serde(default = "default_mkinitcpio_conf")]
    pub mkinitcpio_conf: PathBuf,

    /// AUR helpers in order of preference
    #[serde(default = "default_aur_helpers")]
    pub aur_helpers: Vec<String>,
}

fn default_query_timeout() -> u64 {
    10
}

fn default_network_timeout() -> u64 {
    5
}

fn default_lock_file() -> PathBuf {
    PathBuf::from("/var/lib/pacman/db.lck")
}

fn default_mkinitcpio_conf() -> PathBuf {
    PathBuf::from("/etc/mkinitcpio.conf")
}

fn default_aur_helpers() -> Vec<String> {
    ["paru", "yay", "pikaur", "trizen"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            query_timeout_secs: default_query_timeout(),
            network_timeout_secs: default_network_timeout(),
            lock_file: default_lock_file(),
            mkinitcpio_conf: default_mkinitcpio_conf(),
            aur_helpers: default_aur_helpers(),
        }
    }
}

impl PackageConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    pub fn network_timeout(&self) -> Duration {
        Duration::from_secs(self.network_timeout_secs)
    }
}

/// Privileged operation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationConfig {
    /// Privilege-escalation wrapper used to run the helper
    #[serde(default = "default_escalation_tool")]
    pub escalation_tool: String,

    /// Explicit helper script location (checked after the env override)
    #[serde(default)]
    pub helper_path: Option<PathBuf>,

    /// Seconds to wait after SIGTERM before SIGKILL
    #[serde(default = "default_kill_grace")]
    pub kill_grace_secs: u64,
}

fn default_escalation_tool() -> String {
    "pkexec".to_string()
}

fn default_kill_grace() -> u64 {
    3
}

impl Default for OperationConfig {
    fn default() -> Self {
        Self {
            escalation_tool: default_escalation_tool(),
            helper_path: None,
            kill_grace_secs: default_kill_grace(),
        }
    }
}

impl OperationConfig {
    pub fn kill_grace(&self) -> Duration {
        Duration::from_secs(self.kill_grace_secs)
    }
}

impl Config {
    /// Load the first readable config of [`Config::search_paths`], else
    /// defaults
    ///
    /// Files are not merged: a user config replaces the system one entirely.
    pub fn load() -> Self {
        Self::load_first(&Self::search_paths())
    }

    /// User config first, then the system-wide file
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = Self::user_config_path().into_iter().collect();
        paths.push(PathBuf::from(SYSTEM_CONFIG_PATH));
        paths
    }

    fn load_first(candidates: &[PathBuf]) -> Self {
        for path in candidates.iter().filter(|p| p.exists()) {
            match Self::load_from_path(path) {
                Ok(config) => return config,
                Err(e) => warn!("Ignoring unreadable config: {}", e),
            }
        }

        info!("No config file found, using defaults");
        Config::default()
    }

    /// Load config from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// `$XDG_CONFIG_HOME/rscn-drivers/config.toml`
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join("config.toml"))
    }
}
