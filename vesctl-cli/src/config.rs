//! Configuration file support for vesctl.
//!
//! Configuration is loaded from multiple sources with the following priority
//! (highest first):
//! 1. Command-line arguments
//! 2. Environment variables (VESCTL_*)
//! 3. Local config file (./vesctl.toml)
//! 4. Global config file (~/.config/vesctl/config.toml)

use directories::ProjectDirs;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Connection configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Preferred serial port (e.g., "/dev/ttyACM0" or "COM3").
    pub port: Option<String>,
    /// Link speed in baud.
    pub baud_rate: Option<u32>,
    /// Per-I/O timeout in milliseconds.
    pub timeout_ms: Option<u64>,
}

/// Default motor targets used when flags are omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MotorConfig {
    /// Default RPM target for `run`.
    pub rpm: Option<i32>,
    /// Default duty cycle for `run`, in percent.
    pub duty_percent: Option<u8>,
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Connection settings.
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// Motor target defaults.
    #[serde(default)]
    pub motor: MotorConfig,
}

impl Config {
    /// Load configuration from all available sources.
    pub fn load() -> Self {
        let mut config = Self::default();

        // Load global config
        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                if let Some(global_config) = Self::load_from_file(&global_path) {
                    debug!("Loaded global config from {}", global_path.display());
                    config.merge(global_config);
                }
            }
        }

        // Load local config (overrides global)
        if let Some(local_config) = Self::load_from_file(Path::new("vesctl.toml")) {
            debug!("Loaded local config from vesctl.toml");
            config.merge(local_config);
        }

        config
    }

    /// Load configuration from a specific file path (--config flag).
    pub fn load_from_path(path: &Path) -> Self {
        if let Some(config) = Self::load_from_file(path) {
            debug!("Loaded config from {}", path.display());
            config
        } else {
            warn!(
                "Could not load config from {}, using defaults",
                path.display()
            );
            Self::default()
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => Some(config),
                Err(e) => {
                    warn!("Failed to parse config file {}: {}", path.display(), e);
                    None
                },
            },
            Err(e) => {
                warn!("Failed to read config file {}: {}", path.display(), e);
                None
            },
        }
    }

    /// Get the global configuration directory.
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "vesctl").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the global configuration file path.
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Merge another config into this one.
    fn merge(&mut self, other: Self) {
        if other.connection.port.is_some() {
            self.connection.port = other.connection.port;
        }
        if other.connection.baud_rate.is_some() {
            self.connection.baud_rate = other.connection.baud_rate;
        }
        if other.connection.timeout_ms.is_some() {
            self.connection.timeout_ms = other.connection.timeout_ms;
        }
        if other.motor.rpm.is_some() {
            self.motor.rpm = other.motor.rpm;
        }
        if other.motor.duty_percent.is_some() {
            self.motor.duty_percent = other.motor.duty_percent;
        }
    }

    /// Save the connection configuration (remembers the selected port).
    pub fn save_port(&mut self, port: &str) -> anyhow::Result<()> {
        self.connection.port = Some(port.to_string());

        // Prefer a local file if one is already in use, else the global one.
        let path = if Path::new("vesctl.toml").exists() {
            PathBuf::from("vesctl.toml")
        } else if let Some(global_dir) = Self::global_config_dir() {
            fs::create_dir_all(&global_dir)?;
            global_dir.join("config.toml")
        } else {
            PathBuf::from("vesctl.toml")
        };

        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        debug!("Saved port configuration to {}", path.display());

        Ok(())
    }
}
