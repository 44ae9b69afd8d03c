//! The `chardev` pseudo-device.
//!
//! A read-only character device that serves exactly one session at a time.
//! Every successful open renders a fresh counter-stamped message; reads
//! drain it byte by byte into a caller-owned buffer until end-of-stream;
//! writes are always rejected.
//!
//! # Capability table
//!
//! Hosts drive the device through the [`FileOperations`] trait, the
//! equivalent of a kernel `file_operations` table:
//!
//! ```
//! use chardev_device::{FileOperations, HelloDevice, ModulePin};
//! use chardev_core::SessionId;
//!
//! let device = HelloDevice::new("chardev", ModulePin::new("chardev"));
//! let session = SessionId::next();
//!
//! device.open(session)?;
//! let mut out: Vec<u8> = Vec::new();
//! while device.read(session, &mut out, 8)? > 0 {}
//! device.release(session)?;
//!
//! assert_eq!(out, b"I already told you 0 times Hello world!\n");
//! # Ok::<(), chardev_core::Error>(())
//! ```
//!
//! # Caller buffers
//!
//! Reads never alias caller memory. Each byte goes through
//! [`UserSink::put_user`], which may fail; a failure stops the transfer
//! and surfaces as [`Error::CopyFault`](chardev_core::Error::CopyFault)
//! with the number of bytes already copied.
//!
//! # Thread safety
//!
//! All device state sits behind one mutex, so a [`HelloDevice`] can be
//! shared between threads (typically as `Arc<dyn FileOperations>`).

pub mod device;
pub mod mock;
pub mod pin;
pub mod traits;

pub use device::{HelloDevice, render_message};
pub use pin::{ModulePin, PinGuard};
pub use traits::{FileOperations, SliceSink, UserSink};
