//! TOML configuration: protocol tables, transport and schedule.
//!
//! Every field has a default, so a file only needs the values it changes:
//!
//! ```toml
//! [schedule]
//! zone = 2
//! morning = "06:45"
//! fade_in_secs = 1200
//!
//! [transport]
//! broadcast_addr = "192.168.1.255"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::command::ProtocolConfig;
use crate::scheduler::ScheduleConfig;
use crate::transport::TransportConfig;
use crate::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub protocol: ProtocolConfig,
    pub transport: TransportConfig,
    pub schedule: ScheduleConfig,
}

impl Config {
    /// Reads and validates a config file. A missing or malformed file is an
    /// error, not a silent fallback to defaults.
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading config from {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Loads `path` if given, otherwise the built-in defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        self.protocol.validate()?;
        self.schedule.validate()?;
        if self.transport.port == 0 {
            return Err(Error::InvalidConfig("transport port must not be 0".into()));
        }
        Ok(())
    }
}
