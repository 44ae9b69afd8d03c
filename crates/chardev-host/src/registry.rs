//! Character device registry.
//!
//! Maps major numbers to the capability tables of registered devices, the
//! way a kernel's character device table does. A registered device claims
//! every minor under its major.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use chardev_core::DeviceNumber;
//! use chardev_device::{FileOperations, HelloDevice, ModulePin};
//! use chardev_host::CharDeviceRegistry;
//!
//! let registry = CharDeviceRegistry::new();
//! let device: Arc<dyn FileOperations> =
//!     Arc::new(HelloDevice::new("chardev", ModulePin::new("chardev")));
//!
//! // Major 0 asks for a dynamic major.
//! let major = registry.register(0, "chardev", device)?;
//! assert_eq!(major, 254);
//! assert!(registry.lookup(DeviceNumber::new(major, 0)).is_ok());
//!
//! registry.unregister(major, "chardev")?;
//! # Ok::<(), chardev_host::HostError>(())
//! ```

use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chardev_core::DeviceNumber;
use chardev_core::constants::{DYNAMIC_MAJOR, DYNAMIC_MAJOR_HIGH, DYNAMIC_MAJOR_LOW, MAX_MAJOR};
use chardev_device::FileOperations;
use tracing::{debug, error};

use crate::config::MAX_MINOR;
use crate::error::{HostError, Result};

/// One registered device.
struct Registration {
    name: String,
    ops: Arc<dyn FileOperations>,
}

/// Table of registered character devices, keyed by major number.
#[derive(Default)]
pub struct CharDeviceRegistry {
    devices: Mutex<BTreeMap<u32, Registration>>,
}

impl std::fmt::Debug for CharDeviceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CharDeviceRegistry")
            .field("devices", &self.registered())
            .finish()
    }
}

impl CharDeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `ops` under `major`, or under a free dynamic major when
    /// `major` is `0`. Returns the major the device ended up with.
    ///
    /// Dynamic majors are handed out from the top of the dynamic range
    /// down.
    ///
    /// # Errors
    ///
    /// - [`HostError::InvalidMajor`] if `major` is out of range.
    /// - [`HostError::MajorInUse`] if `major` is taken.
    /// - [`HostError::NoFreeMajor`] if the dynamic range is exhausted.
    pub fn register(&self, major: u32, name: &str, ops: Arc<dyn FileOperations>) -> Result<u32> {
        let mut devices = self.lock();

        let major = if major == DYNAMIC_MAJOR {
            (DYNAMIC_MAJOR_LOW..=DYNAMIC_MAJOR_HIGH)
                .rev()
                .find(|m| !devices.contains_key(m))
                .ok_or_else(|| {
                    error!(device = name, "no free dynamic major");
                    HostError::NoFreeMajor
                })?
        } else if major > MAX_MAJOR {
            return Err(HostError::InvalidMajor { major });
        } else if devices.contains_key(&major) {
            error!(device = name, major, "major already in use");
            return Err(HostError::MajorInUse { major });
        } else {
            major
        };

        devices.insert(
            major,
            Registration {
                name: name.to_string(),
                ops,
            },
        );
        debug!(device = name, major, "character device registered");
        Ok(major)
    }

    /// Remove the device registered as `name` under `major`.
    ///
    /// # Errors
    ///
    /// [`HostError::NotRegistered`] if no device of that name holds `major`.
    pub fn unregister(&self, major: u32, name: &str) -> Result<()> {
        let mut devices = self.lock();
        match devices.get(&major) {
            Some(registration) if registration.name == name => {
                devices.remove(&major);
                debug!(device = name, major, "character device unregistered");
                Ok(())
            }
            _ => Err(HostError::NotRegistered {
                major,
                name: name.to_string(),
            }),
        }
    }

    /// Find the capability table serving `number`.
    ///
    /// # Errors
    ///
    /// [`HostError::NoSuchDevice`] if nothing serves the number.
    pub fn lookup(&self, number: DeviceNumber) -> Result<Arc<dyn FileOperations>> {
        if number.minor > MAX_MINOR {
            return Err(HostError::NoSuchDevice { number });
        }
        self.lock()
            .get(&number.major)
            .map(|r| Arc::clone(&r.ops))
            .ok_or(HostError::NoSuchDevice { number })
    }

    /// Registered `(major, name)` pairs in ascending major order.
    pub fn registered(&self) -> Vec<(u32, String)> {
        self.lock()
            .iter()
            .map(|(major, r)| (*major, r.name.clone()))
            .collect()
    }

    /// Render the table in `/proc/devices` layout.
    ///
    /// ```text
    /// Character devices:
    /// 254 chardev
    /// ```
    pub fn proc_devices(&self) -> String {
        let mut out = String::from("Character devices:\n");
        for (major, name) in self.registered() {
            let _ = writeln!(out, "{major:>3} {name}");
        }
        out
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<u32, Registration>> {
        self.devices.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
