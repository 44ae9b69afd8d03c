//! Module configuration.
//!
//! # Examples
//!
//! ```
//! use chardev_host::ModuleConfig;
//!
//! let config = ModuleConfig::from_json_str(r#"{ "device_name": "hello", "major": 240 }"#)?;
//! assert_eq!(config.device_name, "hello");
//! assert_eq!(config.major, 240);
//! assert_eq!(config.message_capacity, 80);
//! # Ok::<(), chardev_host::HostError>(())
//! ```

use std::path::{Path, PathBuf};

use chardev_core::constants::{BUF_LEN, DEVICE_NAME, DYNAMIC_MAJOR, MAX_MAJOR};
use serde::{Deserialize, Serialize};

use crate::error::{HostError, Result};

/// Largest minor number a node may use.
pub const MAX_MINOR: u32 = 255;

/// Configuration for loading the device module.
///
/// Missing fields take their [`Default`] values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleConfig {
    /// Name the device registers under and the node name in `/dev`.
    pub device_name: String,

    /// Requested major number, `0` for dynamic allocation.
    pub major: u32,

    /// Minor number of the node the module suggests creating.
    pub minor: u32,

    /// Message buffer length in bytes.
    pub message_capacity: usize,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            device_name: DEVICE_NAME.to_string(),
            major: DYNAMIC_MAJOR,
            minor: 0,
            message_capacity: BUF_LEN,
        }
    }
}

impl ModuleConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Check every field is usable.
    pub fn validate(&self) -> Result<()> {
        if self.device_name.is_empty() {
            return Err(HostError::config("device_name must not be empty"));
        }
        if self
            .device_name
            .chars()
            .any(|c| c == '/' || c.is_whitespace())
        {
            return Err(HostError::config(format!(
                "device_name contains '/' or whitespace: {:?}",
                self.device_name
            )));
        }
        if self.major > MAX_MAJOR {
            return Err(HostError::InvalidMajor { major: self.major });
        }
        if self.minor > MAX_MINOR {
            return Err(HostError::config(format!(
                "minor must be 0-{MAX_MINOR}, got {}",
                self.minor
            )));
        }
        if self.message_capacity == 0 {
            return Err(HostError::config("message_capacity must be positive"));
        }
        Ok(())
    }

    /// Path of the device node, e.g. `/dev/chardev`.
    pub fn node_path(&self) -> PathBuf {
        Path::new("/dev").join(&self.device_name)
    }
}
