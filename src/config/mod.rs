/// Configuration management for the sciflow service
///
/// Handles server binding, storage locations and the identity of the local platform.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Storage configuration
    pub storage: StorageConfig,
    /// Platform configuration
    pub platform: PlatformConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Server port number
    pub port: u16,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Base directory (default: "data")
    /// Creates: sciflow.db, settings/
    pub data_dir: String,
}

/// Identity of this platform in a distributed setup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Platform id used for component resolution and as default controller platform
    pub local_platform: String,
}

impl StorageConfig {
    /// SQLite file holding workflow definitions
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("sciflow.db")
    }

    /// Directory of the placeholder history files
    pub fn settings_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("settings")
    }
}

impl Default for Config {
    /// Default configuration with ENV_VAR support for container deployment
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: std::env::var("SCIFLOW_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: std::env::var("SCIFLOW_PORT")
                    .unwrap_or_else(|_| "3004".to_string())
                    .parse()
                    .unwrap_or(3004),
            },
            storage: StorageConfig {
                data_dir: std::env::var("SCIFLOW_DATA_DIR").unwrap_or_else(|_| "data".to_string()),
            },
            platform: PlatformConfig {
                local_platform: std::env::var("SCIFLOW_PLATFORM")
                    .unwrap_or_else(|_| "local".to_string()),
            },
        }
    }
}
