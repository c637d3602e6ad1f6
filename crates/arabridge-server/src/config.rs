//! Server configuration.

use crate::error::{Result, ServerError};
use arabridge_ipc::ConnectionConfig;
use arabridge_wire::payload::FactoryDescriptor;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration of a plug-in endpoint process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket carrying the host's main-thread traffic.
    pub main_socket_path: PathBuf,
    /// Socket carrying traffic from every other host thread.
    pub other_socket_path: PathBuf,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Factories announced to the host during bootstrap.
    #[serde(default)]
    pub factories: Vec<FactoryDescriptor>,
}

fn default_poll_interval_ms() -> u64 {
    1
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            main_socket_path: std::env::temp_dir().join("arabridge-main.sock"),
            other_socket_path: std::env::temp_dir().join("arabridge-other.sock"),
            poll_interval_ms: default_poll_interval_ms(),
            factories: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Read a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: ServerConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.main_socket_path == self.other_socket_path {
            return Err(ServerError::InvalidConfig(format!(
                "main and other-threads sockets share the path {}",
                self.main_socket_path.display()
            )));
        }
        if self.poll_interval_ms == 0 || self.poll_interval_ms > 1000 {
            return Err(ServerError::InvalidConfig(format!(
                "poll_interval_ms {} out of range (1-1000)",
                self.poll_interval_ms
            )));
        }
        for (index, factory) in self.factories.iter().enumerate() {
            if factory.lowest_api_generation > factory.highest_api_generation {
                return Err(ServerError::InvalidConfig(format!(
                    "factory {} ({}) has an empty API generation range",
                    index, factory.factory_id
                )));
            }
        }
        Ok(())
    }

    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            ..Default::default()
        }
    }
}
