//! Constants defining the device's observable behaviour.
//!
//! # Message format
//!
//! Every successful open renders one line:
//!
//! ```text
//! I already told you {N} times Hello world!\n
//! ```
//!
//! `{N}` is the number of opens that succeeded *before* this one, so the
//! first session reads `0`, the second `1`, and so on.
//!
//! ```
//! use chardev_core::constants::{MESSAGE_PREFIX, MESSAGE_SUFFIX};
//!
//! let line = format!("{MESSAGE_PREFIX}{}{MESSAGE_SUFFIX}", 0);
//! assert_eq!(line, "I already told you 0 times Hello world!\n");
//! ```

// ============================================================================
// Device identity
// ============================================================================

/// Name the device registers under and the default node name.
pub const DEVICE_NAME: &str = "chardev";

/// Default message buffer length in bytes.
///
/// A `u64` counter renders to at most 60 bytes, so the default always fits.
pub const BUF_LEN: usize = 80;

// ============================================================================
// Message template
// ============================================================================

/// Text preceding the counter in every message.
pub const MESSAGE_PREFIX: &str = "I already told you ";

/// Text following the counter in every message.
pub const MESSAGE_SUFFIX: &str = " times Hello world!\n";

// ============================================================================
// Device numbers
// ============================================================================

/// Requesting this major asks the registry for a dynamic one.
pub const DYNAMIC_MAJOR: u32 = 0;

/// Highest major handed out by dynamic allocation.
pub const DYNAMIC_MAJOR_HIGH: u32 = 254;

/// Lowest major handed out by dynamic allocation.
pub const DYNAMIC_MAJOR_LOW: u32 = 234;

/// Largest major a caller may request explicitly.
pub const MAX_MAJOR: u32 = 511;

// ============================================================================
// errno values (positive; the ABI negates them)
// ============================================================================

/// Bad file descriptor.
pub const EBADF: i32 = 9;

/// No such device or address.
pub const ENXIO: i32 = 6;

/// Bad address.
pub const EFAULT: i32 = 14;

/// Device or resource busy.
pub const EBUSY: i32 = 16;

/// No such device.
pub const ENODEV: i32 = 19;

/// Invalid argument.
pub const EINVAL: i32 = 22;

/// No space left on device.
pub const ENOSPC: i32 = 28;
