//! Configuration management for the viewer settings

use crate::{ConnectionInfo, Error, LogLevel, Result, MAX_LOG_NUM};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Current config version for migration support
pub const CONFIG_VERSION: u32 = 1;

/// Upper bound accepted for `logs.max_entries`
pub const MAX_ENTRIES_LIMIT: usize = 100_000;

/// Global configuration for the viewer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewerConfig {
    pub version: u32,
    pub core: CoreSection,
    pub logs: LogsSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreSection {
    /// External controller address of the proxy core (host:port)
    pub server: String,
    /// Controller secret, sent as the `token` query parameter
    #[serde(default)]
    pub secret: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogsSection {
    /// Whether the live log feed is open
    pub enabled: bool,
    /// Level requested from the core
    pub level: LogLevel,
    /// Entries kept per level
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

fn default_max_entries() -> usize {
    MAX_LOG_NUM
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            core: CoreSection {
                server: "127.0.0.1:9097".to_string(),
                secret: String::new(),
            },
            logs: LogsSection {
                enabled: true,
                level: LogLevel::Info,
                max_entries: MAX_LOG_NUM,
            },
        }
    }
}

impl ViewerConfig {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("proxy-log-viewer")
            .join("config.toml")
    }

    /// Load config from file, or create default if not exists
    pub fn load_or_default() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load(&path)
        } else {
            let config = Self::default();
            config.save()?;
            Ok(config)
        }
    }

    /// Load config from a specific path
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        if config.version > CONFIG_VERSION {
            return Err(Error::config(format!(
                "config version {} is newer than supported version {}",
                config.version, CONFIG_VERSION
            )));
        }
        config.validate()?;
        Ok(config)
    }

    /// Save config to the default path
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        self.save_to(&path)
    }

    /// Save config to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let server = self.core.server.trim();
        if server.contains("://") || server.contains('/') {
            return Err(Error::validation(
                "Server must be a host:port address without scheme or path",
            ));
        }
        if server.chars().any(char::is_whitespace) {
            return Err(Error::validation("Server address cannot contain spaces"));
        }
        if self.logs.max_entries == 0 || self.logs.max_entries > MAX_ENTRIES_LIMIT {
            return Err(Error::validation(format!(
                "Max entries must be between 1 and {}",
                MAX_ENTRIES_LIMIT
            )));
        }
        Ok(())
    }

    /// Connection info for the live feed, if a server is configured
    pub fn connection_info(&self) -> Option<ConnectionInfo> {
        let server = self.core.server.trim();
        if server.is_empty() {
            return None;
        }
        Some(ConnectionInfo::new(server, self.core.secret.clone()))
    }
}
