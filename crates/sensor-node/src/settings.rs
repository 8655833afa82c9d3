//! Node Configuration
//!
//! Read from an optional TOML file, then overridden by environment
//! variables such as `SENSOR_NODE__DEVICE_ID` or
//! `SENSOR_NODE__TRANSPORT__SERIAL__DEVICE`.

use anyhow::{Context, Result};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use radio_transport::{NodeIdentity, TransportConfig};
use serde::{Deserialize, Serialize};

/// Environment variable prefix
pub const ENV_PREFIX: &str = "SENSOR_NODE";

/// Everything one node needs to run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub device_id: String,
    /// Mesh network identifier programmed into the radio
    pub network_id: String,
    pub coordinator: bool,
    /// Server the coordinator forwards events to
    pub remote_server: String,
    /// Maximum log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit logs as JSON lines
    pub log_json: bool,
    /// Program network and role into the radio before serving
    pub provision_on_start: bool,
    /// Run against an in-memory radio instead of the serial port
    pub mock_radio: bool,
    pub transport: TransportConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            device_id: "node-0".to_string(),
            network_id: "3332".to_string(),
            coordinator: false,
            remote_server: "localhost:8080".to_string(),
            log_level: "info".to_string(),
            log_json: false,
            provision_on_start: false,
            mock_radio: false,
            transport: TransportConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Load from `path` (if given) and the environment
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path).required(false));
        }
        Self::build(builder).with_context(|| match path {
            Some(path) => format!("Failed to load node configuration from {path}"),
            None => "Failed to load node configuration".to_string(),
        })
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let config: Self = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        config.transport.validate()?;
        Ok(config)
    }
}

/// Node identity fixed by configuration
#[derive(Debug, Clone)]
pub struct StaticIdentity {
    device_id: String,
    network_id: String,
    coordinator: bool,
    remote_server: String,
}

impl StaticIdentity {
    pub fn from_config(config: &NodeConfig) -> Self {
        Self {
            device_id: config.device_id.clone(),
            network_id: config.network_id.clone(),
            coordinator: config.coordinator,
            remote_server: config.remote_server.clone(),
        }
    }
}

impl NodeIdentity for StaticIdentity {
    fn is_coordinator(&self) -> bool {
        self.coordinator
    }

    fn device_id(&self) -> String {
        self.device_id.clone()
    }

    fn network_id(&self) -> String {
        self.network_id.clone()
    }

    fn remote_server_address(&self) -> String {
        self.remote_server.clone()
    }
}
