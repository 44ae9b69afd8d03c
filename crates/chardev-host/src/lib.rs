//! In-process host for the `chardev` device.
//!
//! Models the pieces of an operating system a character device driver
//! plugs into:
//!
//! - [`CharDeviceRegistry`]: the major-number table devices register in.
//! - [`ChardevModule`]: module init/cleanup, including the refusal to
//!   unload while a session pins the module.
//! - [`FileHandle`]: an open file, dispatching to the device's capability
//!   table and releasing its session when closed or dropped.
//! - [`ModuleConfig`]: JSON-loadable module parameters.
//!
//! # Examples
//!
//! ```
//! use chardev_host::{CharDeviceRegistry, ChardevModule, FileHandle, ModuleConfig};
//!
//! let registry = CharDeviceRegistry::new();
//! let module = ChardevModule::init(ModuleConfig::default(), &registry)?;
//!
//! for n in 0..3 {
//!     let mut file = FileHandle::open(&registry, module.device_number())?;
//!     let text = String::from_utf8(file.read_message()?).unwrap();
//!     assert_eq!(text, format!("I already told you {n} times Hello world!\n"));
//! }
//!
//! module.cleanup(&registry).map_err(|(_, e)| e)?;
//! # Ok::<(), chardev_host::HostError>(())
//! ```

pub mod config;
pub mod error;
pub mod file;
pub mod module;
pub mod registry;

pub use config::ModuleConfig;
pub use error::{HostError, Result};
pub use file::FileHandle;
pub use module::ChardevModule;
pub use registry::CharDeviceRegistry;
