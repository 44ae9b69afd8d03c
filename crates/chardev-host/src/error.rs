//! Error types for the host side: registration, module lifecycle and
//! configuration.

use chardev_core::DeviceNumber;
use chardev_core::constants::{EBUSY, EINVAL, ENXIO};

/// Result type alias for host operations.
pub type Result<T> = std::result::Result<T, HostError>;

/// Errors raised by the host model.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// A device operation failed.
    #[error(transparent)]
    Device(#[from] chardev_core::Error),

    /// The requested major number is already registered.
    #[error("Major {major} is already in use")]
    MajorInUse { major: u32 },

    /// Dynamic allocation found no free major.
    #[error("No free dynamic major number")]
    NoFreeMajor,

    /// The requested major number is out of range.
    #[error("Invalid major number: {major}")]
    InvalidMajor { major: u32 },

    /// No device with this name is registered under the major.
    #[error("No device {name} registered under major {major}")]
    NotRegistered { major: u32, name: String },

    /// Nothing is registered for the device number.
    #[error("No such device: {number}")]
    NoSuchDevice { number: DeviceNumber },

    /// The module is still pinned by open sessions.
    #[error("Module {name} is in use ({refs} references)")]
    ModuleBusy { name: String, refs: usize },

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file is not valid JSON.
    #[error("Invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl HostError {
    /// Create a new configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Negative errno value the host ABI returns for this error.
    pub fn errno(&self) -> i32 {
        match self {
            Self::Device(e) => e.errno(),
            Self::MajorInUse { .. } | Self::NoFreeMajor | Self::ModuleBusy { .. } => -EBUSY,
            Self::NotRegistered { .. } | Self::NoSuchDevice { .. } => -ENXIO,
            Self::InvalidMajor { .. } | Self::Config(_) | Self::Io(_) | Self::Json(_) => -EINVAL,
        }
    }

    /// The device-level error, if this wraps one.
    pub fn as_device(&self) -> Option<&chardev_core::Error> {
        match self {
            Self::Device(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(HostError::from(chardev_core::Error::AlreadyBusy), -16)]
    #[case(HostError::MajorInUse { major: 254 }, -16)]
    #[case(HostError::NoFreeMajor, -16)]
    #[case(HostError::ModuleBusy { name: "chardev".into(), refs: 1 }, -16)]
    #[case(HostError::NoSuchDevice { number: DeviceNumber::new(1, 0) }, -6)]
    #[case(HostError::InvalidMajor { major: 9000 }, -22)]
    #[case(HostError::config("bad"), -22)]
    fn test_errno_mapping(#[case] error: HostError, #[case] expected: i32) {
        assert_eq!(error.errno(), expected);
    }

    #[test]
    fn test_device_error_is_transparent() {
        let error = HostError::from(chardev_core::Error::NotOpen);
        assert_eq!(error.to_string(), "Device is not open for this session");
        assert_eq!(error.as_device(), Some(&chardev_core::Error::NotOpen));
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            HostError::ModuleBusy {
                name: "chardev".into(),
                refs: 2
            }
            .to_string(),
            "Module chardev is in use (2 references)"
        );
        assert_eq!(
            HostError::NoSuchDevice {
                number: DeviceNumber::new(200, 1)
            }
            .to_string(),
            "No such device: 200:1"
        );
    }
}
