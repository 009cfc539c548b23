//! Configuration for httpkv
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::auth::Credential;
use crate::error::{KvError, Result};

/// Name of the single bucket holding every record
pub const BUCKET_NAME: &str = "main";

/// Main configuration for an httpkv instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all data files
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── wal.log          (write-ahead log)
    ///     └── data.db          (latest checkpoint)
    pub data_dir: PathBuf,

    /// WAL size (in bytes) past which a checkpoint is written
    pub checkpoint_threshold: u64,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// HTTP listen address
    pub listen_addr: String,

    /// Largest accepted request body (in bytes)
    pub max_value_size: usize,

    /// How long in-flight requests may run once shutdown starts
    pub shutdown_grace: Duration,

    // -------------------------------------------------------------------------
    // Access Control
    // -------------------------------------------------------------------------
    /// Shared secret every request must present
    pub auth_key: Credential,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./httpkv_data"),
            checkpoint_threshold: 64 * 1024 * 1024, // 64 MB
            listen_addr: "0.0.0.0:8000".to_string(),
            max_value_size: 16 * 1024 * 1024, // 16 MB
            shutdown_grace: Duration::from_secs(5),
            auth_key: Credential::default(),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject configurations the service must not start with
    pub fn validate(&self) -> Result<()> {
        if self.auth_key.is_empty() {
            return Err(KvError::Config(
                "auth key is empty; set AUTHKEY or pass --auth-key".to_string(),
            ));
        }
        if self.max_value_size == 0 {
            return Err(KvError::Config("max_value_size must be positive".to_string()));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the WAL size that triggers a checkpoint (in bytes)
    pub fn checkpoint_threshold(mut self, bytes: u64) -> Self {
        self.config.checkpoint_threshold = bytes;
        self
    }

    /// Set the HTTP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the maximum request body size (in bytes)
    pub fn max_value_size(mut self, size: usize) -> Self {
        self.config.max_value_size = size;
        self
    }

    /// Set the shutdown grace period
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.config.shutdown_grace = grace;
        self
    }

    /// Set the shared secret
    pub fn auth_key(mut self, key: impl Into<Credential>) -> Self {
        self.config.auth_key = key.into();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
