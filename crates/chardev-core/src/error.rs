//! Error types for device operations.
//!
//! Every failure the device can report is a variant of [`Error`]. Each
//! variant maps to the negative errno a host kernel would hand back to the
//! calling process, see [`Error::errno`].

use thiserror::Error;

use crate::constants::{EBADF, EBUSY, EFAULT, EINVAL, ENODEV, ENOSPC};

/// Errors reported by the device's file operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// `open` was attempted while another session holds the device.
    #[error("Device or resource busy")]
    AlreadyBusy,

    /// The operation is not part of the device's contract.
    #[error("Operation not supported: {operation}")]
    NotSupported { operation: &'static str },

    /// Copying into the caller's buffer failed part way through.
    #[error("Bad address: copy to caller buffer failed after {transferred} bytes")]
    CopyFault { transferred: usize },

    /// `read` or `release` was called without an active session.
    #[error("Device is not open for this session")]
    NotOpen,

    /// `open` raced with the owning module being unloaded.
    #[error("No such device: module is unloading")]
    Unloading,

    /// The rendered message does not fit the configured buffer.
    #[error("Message of {len} bytes exceeds buffer capacity of {capacity} bytes")]
    MessageTooLong { len: usize, capacity: usize },
}

impl Error {
    /// Create a new not-supported error.
    pub fn not_supported(operation: &'static str) -> Self {
        Self::NotSupported { operation }
    }

    /// Create a new copy fault carrying the partial transfer count.
    pub fn copy_fault(transferred: usize) -> Self {
        Self::CopyFault { transferred }
    }

    /// Negative errno value a host ABI returns for this error.
    ///
    /// ```
    /// use chardev_core::Error;
    ///
    /// assert_eq!(Error::AlreadyBusy.errno(), -16);
    /// assert_eq!(Error::not_supported("write").errno(), -22);
    /// ```
    pub fn errno(&self) -> i32 {
        let code = match self {
            Self::AlreadyBusy => EBUSY,
            Self::NotSupported { .. } => EINVAL,
            Self::CopyFault { .. } => EFAULT,
            Self::NotOpen => EBADF,
            Self::Unloading => ENODEV,
            Self::MessageTooLong { .. } => ENOSPC,
        };
        -code
    }

    /// Whether retrying the same call later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::AlreadyBusy)
    }

    /// Bytes transferred before the failure, for errors that carry one.
    pub fn partial_transfer(&self) -> Option<usize> {
        match self {
            Self::CopyFault { transferred } => Some(*transferred),
            _ => None,
        }
    }
}

/// A single failed copy into caller-owned memory.
///
/// Returned by destination buffers when the byte at `offset` cannot be
/// written. The device turns it into [`Error::CopyFault`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Bad address at buffer offset {offset}")]
pub struct Fault {
    /// Offset into the destination buffer that could not be written.
    pub offset: usize,
}

impl Fault {
    /// Create a fault at the given destination offset.
    pub fn at(offset: usize) -> Self {
        Self { offset }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Error::AlreadyBusy, -16)]
    #[case(Error::not_supported("write"), -22)]
    #[case(Error::copy_fault(3), -14)]
    #[case(Error::NotOpen, -9)]
    #[case(Error::Unloading, -19)]
    #[case(Error::MessageTooLong { len: 90, capacity: 80 }, -28)]
    fn test_errno_mapping(#[case] error: Error, #[case] expected: i32) {
        assert_eq!(error.errno(), expected);
    }

    #[test]
    fn test_only_busy_is_retryable() {
        assert!(Error::AlreadyBusy.is_retryable());
        assert!(!Error::not_supported("write").is_retryable());
        assert!(!Error::copy_fault(0).is_retryable());
        assert!(!Error::NotOpen.is_retryable());
        assert!(!Error::Unloading.is_retryable());
    }

    #[test]
    fn test_partial_transfer() {
        assert_eq!(Error::copy_fault(7).partial_transfer(), Some(7));
        assert_eq!(Error::AlreadyBusy.partial_transfer(), None);
    }

    #[test]
    fn test_error_display() {
        assert_eq!(Error::AlreadyBusy.to_string(), "Device or resource busy");
        assert_eq!(
            Error::not_supported("write").to_string(),
            "Operation not supported: write"
        );
        assert_eq!(
            Error::copy_fault(5).to_string(),
            "Bad address: copy to caller buffer failed after 5 bytes"
        );
        assert_eq!(Fault::at(12).to_string(), "Bad address at buffer offset 12");
    }
}
