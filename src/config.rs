//! Configuration Management
//!
//! Handles persistent configuration storage for ovnscope.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the northbound database lives
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionConfig {
    /// Namespace the OVN pods run in
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Label selector matching the pods that carry the nbdb container
    #[serde(default = "default_label_selector")]
    pub label_selector: String,
    #[serde(default = "default_container")]
    pub container: String,
    /// Explicit kubeconfig; kubectl defaults apply when unset
    #[serde(default)]
    pub kubeconfig: Option<PathBuf>,
    /// Prefer the pod scheduled on this node
    #[serde(default)]
    pub node_name: Option<String>,
}

fn default_namespace() -> String {
    "openshift-ovn-kubernetes".to_string()
}

fn default_label_selector() -> String {
    "app=ovnkube-node".to_string()
}

fn default_container() -> String {
    "nbdb".to_string()
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            label_selector: default_label_selector(),
            container: default_container(),
            kubeconfig: None,
            node_name: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheConfig {
    /// Cache root; see `SnapshotCache::default_root` when unset
    #[serde(default)]
    pub dir: Option<PathBuf>,
    /// Seed the live view from disk before the first fetch
    #[serde(default = "default_true")]
    pub load_on_startup: bool,
    /// Snapshots older than this are reported as stale
    #[serde(default = "default_expiry_secs")]
    pub expiry_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_expiry_secs() -> u64 {
    3600
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            load_on_startup: true,
            expiry_secs: default_expiry_secs(),
        }
    }
}

impl CacheConfig {
    pub fn expiry(&self) -> Duration {
        Duration::from_secs(self.expiry_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "off".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

impl Config {
    /// Get the default config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("ovnscope").join("config.yaml"))
    }

    /// Load configuration from `path`, or the default location.
    /// Missing or unreadable files fall back to defaults.
    pub fn load(path: Option<&Path>) -> Self {
        Self::try_load(path).unwrap_or_else(|e| {
            tracing::warn!("{:#}", e);
            Self::default()
        })
    }

    /// Like [`Config::load`], but a file that exists and cannot be read or
    /// parsed is an error. A missing file still yields the defaults.
    pub fn try_load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path.map(Path::to_path_buf).or_else(Self::config_path) else {
            return Ok(Self::default());
        };

        if !path.exists() {
            return Ok(Self::default());
        }

        let config = Self::load_from_file(&path)
            .with_context(|| format!("Failed to load configuration from {:?}", path))?;
        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {:?}", path))?;
        let config: Config =
            serde_yaml::from_str(&content).context("Failed to parse configuration")?;
        Ok(config)
    }

    /// Save configuration to `path`, or the default location
    pub fn save(&self, path: Option<&Path>) -> Result<()> {
        let Some(path) = path.map(Path::to_path_buf).or_else(Self::config_path) else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)?;
        std::fs::write(&path, content)?;

        Ok(())
    }

    /// Get effective cache directory (config > platform default)
    pub fn effective_cache_dir(&self) -> PathBuf {
        self.cache
            .dir
            .clone()
            .unwrap_or_else(crate::resource::SnapshotCache::default_root)
    }
}
