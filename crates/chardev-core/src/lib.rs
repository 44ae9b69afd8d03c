//! Shared building blocks for the `chardev` pseudo-device.
//!
//! Holds the error type every layer reports through, the constants that
//! define the device's observable behaviour, and the small value types
//! (device numbers, session ids, device state) exchanged between the
//! device and its host.

pub mod constants;
pub mod error;
pub mod types;

pub use error::{Error, Fault, Result};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
