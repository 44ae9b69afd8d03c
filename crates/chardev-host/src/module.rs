//! Loadable module lifecycle.
//!
//! [`ChardevModule::init`] builds the device, registers it and logs how to
//! create a node for it; [`ChardevModule::cleanup`] unregisters it once no
//! session pins the module.
//!
//! ```text
//! init ──► registered ──► cleanup ──► unloaded
//!              │   ▲
//!         open │   │ release
//!              ▼   │
//!            pinned (cleanup refused)
//! ```

use std::sync::Arc;

use chardev_core::{DeviceNumber, DeviceStatus};
use chardev_device::{FileOperations, HelloDevice, ModulePin};
use tracing::{error, info, warn};

use crate::config::ModuleConfig;
use crate::error::{HostError, Result};
use crate::registry::CharDeviceRegistry;

/// A loaded instance of the device module.
///
/// # Examples
///
/// ```
/// use chardev_host::{CharDeviceRegistry, ChardevModule, FileHandle, ModuleConfig};
///
/// let registry = CharDeviceRegistry::new();
/// let module = ChardevModule::init(ModuleConfig::default(), &registry)?;
///
/// let mut file = FileHandle::open(&registry, module.device_number())?;
/// assert_eq!(file.read_message()?, b"I already told you 0 times Hello world!\n");
///
/// // Refused while the file is open; the module comes back.
/// let (module, _busy) = module.cleanup(&registry).unwrap_err();
///
/// file.close()?;
/// module.cleanup(&registry).map_err(|(_, e)| e)?;
/// # Ok::<(), chardev_host::HostError>(())
/// ```
#[derive(Debug)]
pub struct ChardevModule {
    config: ModuleConfig,
    device: Arc<HelloDevice>,
    major: u32,
}

impl ChardevModule {
    /// Construct the device and register it.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or registration
    /// fails; nothing stays registered in that case.
    pub fn init(config: ModuleConfig, registry: &CharDeviceRegistry) -> Result<Self> {
        info!(module = %config.device_name, "init module");
        config.validate()?;

        let pin = ModulePin::new(config.device_name.clone());
        let device = Arc::new(HelloDevice::with_capacity(
            config.device_name.clone(),
            pin,
            config.message_capacity,
        ));

        let ops: Arc<dyn FileOperations> = device.clone();
        let major = match registry.register(config.major, &config.device_name, ops) {
            Ok(major) => major,
            Err(e) => {
                error!(
                    module = %config.device_name,
                    errno = e.errno(),
                    "registering the character device failed: {e}"
                );
                return Err(e);
            }
        };

        let module = Self {
            config,
            device,
            major,
        };
        info!(module = %module.config.device_name, major, "assigned major number");
        info!("to talk to the driver, create a dev file with '{}'", module.mknod_hint());
        info!("try to cat and echo to the device file, remove the device file and module when done");
        Ok(module)
    }

    /// Unregister the device and unload the module.
    ///
    /// Once cleanup starts the module's pin refuses new references, so an
    /// open that already looked the device up fails with `Unloading` instead
    /// of pinning an unloaded module.
    ///
    /// # Errors
    ///
    /// [`HostError::ModuleBusy`] while any session holds the device. The
    /// module is handed back still registered, and cleanup can be retried.
    pub fn cleanup(
        self,
        registry: &CharDeviceRegistry,
    ) -> std::result::Result<(), (Self, HostError)> {
        let pin = self.device.pin();
        if let Err(refs) = pin.begin_unload() {
            warn!(module = %self.config.device_name, refs, "cleanup refused, module in use");
            let err = HostError::ModuleBusy {
                name: self.config.device_name.clone(),
                refs,
            };
            return Err((self, err));
        }

        if let Err(e) = registry.unregister(self.major, &self.config.device_name) {
            error!(module = %self.config.device_name, major = self.major, "unregistering failed: {e}");
            pin.cancel_unload();
            return Err((self, e));
        }

        info!(module = %self.config.device_name, major = self.major, "cleanup module");
        Ok(())
    }

    pub fn major(&self) -> u32 {
        self.major
    }

    /// Number of the node the module suggests creating.
    pub fn device_number(&self) -> DeviceNumber {
        DeviceNumber::new(self.major, self.config.minor)
    }

    /// Shell command creating the device node.
    pub fn mknod_hint(&self) -> String {
        format!(
            "mknod {} c {} {}",
            self.config.node_path().display(),
            self.major,
            self.config.minor
        )
    }

    /// References currently pinning the module.
    pub fn ref_count(&self) -> usize {
        self.device.pin().count()
    }

    pub fn status(&self) -> DeviceStatus {
        self.device.status()
    }

    pub fn device(&self) -> &Arc<HelloDevice> {
        &self.device
    }

    pub fn config(&self) -> &ModuleConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chardev_core::{DeviceState, Error, SessionId};

    #[test]
    fn test_init_registers_dynamic_major() {
        let registry = CharDeviceRegistry::new();
        let module = ChardevModule::init(ModuleConfig::default(), &registry).unwrap();

        assert_eq!(module.major(), 254);
        assert_eq!(registry.registered(), vec![(254, "chardev".to_string())]);
        assert_eq!(module.mknod_hint(), "mknod /dev/chardev c 254 0");
        assert_eq!(module.status().state, DeviceState::Closed);
    }

    #[test]
    fn test_init_with_taken_major_fails() {
        let registry = CharDeviceRegistry::new();
        let config = ModuleConfig {
            major: 240,
            ..ModuleConfig::default()
        };
        ChardevModule::init(config.clone(), &registry).unwrap();

        let second = ModuleConfig {
            device_name: "other".into(),
            ..config
        };
        assert!(matches!(
            ChardevModule::init(second, &registry),
            Err(HostError::MajorInUse { major: 240 })
        ));
        assert_eq!(registry.registered().len(), 1);
    }

    #[test]
    fn test_init_rejects_invalid_config() {
        let registry = CharDeviceRegistry::new();
        let config = ModuleConfig {
            device_name: String::new(),
            ..ModuleConfig::default()
        };
        assert!(matches!(
            ChardevModule::init(config, &registry),
            Err(HostError::Config(_))
        ));
        assert!(registry.registered().is_empty());
    }

    #[test]
    fn test_cleanup_refused_while_pinned() {
        let registry = CharDeviceRegistry::new();
        let module = ChardevModule::init(ModuleConfig::default(), &registry).unwrap();
        let session = SessionId::next();

        module.device().open(session).unwrap();
        assert_eq!(module.ref_count(), 1);
        let (module, err) = module.cleanup(&registry).unwrap_err();
        assert!(matches!(err, HostError::ModuleBusy { refs: 1, .. }));
        assert_eq!(registry.registered().len(), 1);
        assert!(!module.device().pin().is_going());

        module.device().release(session).unwrap();
        module.cleanup(&registry).unwrap();
        assert!(registry.registered().is_empty());
    }

    #[test]
    fn test_open_after_cleanup_is_refused() {
        let registry = CharDeviceRegistry::new();
        let module = ChardevModule::init(ModuleConfig::default(), &registry).unwrap();

        let ops = registry.lookup(module.device_number()).unwrap();
        let device = Arc::clone(module.device());
        module.cleanup(&registry).unwrap();

        assert_eq!(ops.open(SessionId::next()), Err(Error::Unloading));
        assert_eq!(device.pin().count(), 0);
        assert_eq!(device.state(), DeviceState::Closed);
        assert!(registry.registered().is_empty());
    }

    #[test]
    fn test_failed_unregister_hands_module_back() {
        let registry = CharDeviceRegistry::new();
        let module = ChardevModule::init(ModuleConfig::default(), &registry).unwrap();
        registry.unregister(module.major(), "chardev").unwrap();

        let (module, err) = module.cleanup(&registry).unwrap_err();
        assert!(matches!(err, HostError::NotRegistered { .. }));
        assert!(!module.device().pin().is_going());
        assert!(module.device().open(SessionId::next()).is_ok());
    }
}
