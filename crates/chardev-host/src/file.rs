//! Open files on a character device.
//!
//! A [`FileHandle`] is what a process gets back from opening a device node:
//! it carries the session id the device sees and routes reads, writes and
//! the final release through the device's capability table. Dropping a
//! handle releases its session exactly once, like a process exiting with
//! the file still open.
//!
//! Handles also implement [`std::io::Read`] and [`std::io::Write`], so the
//! usual `cat` and `echo` patterns work:
//!
//! ```
//! use std::io::{Read, Write};
//! use chardev_host::{CharDeviceRegistry, ChardevModule, FileHandle, ModuleConfig};
//!
//! let registry = CharDeviceRegistry::new();
//! let module = ChardevModule::init(ModuleConfig::default(), &registry).unwrap();
//!
//! // cat /dev/chardev
//! let mut file = FileHandle::open(&registry, module.device_number()).unwrap();
//! let mut text = String::new();
//! file.read_to_string(&mut text).unwrap();
//! assert_eq!(text, "I already told you 0 times Hello world!\n");
//!
//! // echo hi > /dev/chardev
//! let err = file.write_all(b"hi\n").unwrap_err();
//! assert_eq!(err.kind(), std::io::ErrorKind::Unsupported);
//! ```

use std::io;
use std::sync::Arc;

use chardev_core::{DeviceNumber, Error, SessionId};
use chardev_device::{FileOperations, SliceSink, UserSink};
use tracing::{debug, warn};

use crate::error::Result;
use crate::registry::CharDeviceRegistry;

/// Read size used by [`FileHandle::read_message`].
pub const DEFAULT_CHUNK: usize = 4096;

/// One open file on a registered device.
pub struct FileHandle {
    ops: Arc<dyn FileOperations>,
    session: SessionId,
    number: DeviceNumber,

    /// Set once the session has been handed back to the device.
    released: bool,
}

impl std::fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileHandle")
            .field("device", &self.ops.name())
            .field("session", &self.session)
            .field("number", &self.number)
            .finish()
    }
}

impl FileHandle {
    /// Open the device serving `number` under a fresh session.
    ///
    /// # Errors
    ///
    /// - [`HostError::NoSuchDevice`](crate::HostError::NoSuchDevice) if
    ///   nothing is registered for `number`.
    /// - `AlreadyBusy` from the device if another session holds it.
    pub fn open(registry: &CharDeviceRegistry, number: DeviceNumber) -> Result<Self> {
        let ops = registry.lookup(number)?;
        let session = SessionId::next();
        ops.open(session)?;
        debug!(device = ops.name(), %session, %number, "file opened");
        Ok(Self {
            ops,
            session,
            number,
            released: false,
        })
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn number(&self) -> DeviceNumber {
        self.number
    }

    /// Copy up to `len` bytes into `sink`. Returns `0` at end-of-stream.
    pub fn read_to(&mut self, sink: &mut dyn UserSink, len: usize) -> Result<usize> {
        Ok(self.ops.read(self.session, sink, len)?)
    }

    /// Read until end-of-stream and return everything read.
    pub fn read_message(&mut self) -> Result<Vec<u8>> {
        let mut out: Vec<u8> = Vec::new();
        while self.read_to(&mut out, DEFAULT_CHUNK)? > 0 {}
        Ok(out)
    }

    /// Write to the device. Returns the number of bytes accepted.
    pub fn write_bytes(&mut self, data: &[u8]) -> Result<usize> {
        match self.ops.write(self.session, data)? {}
    }

    /// Release the session, reporting any error.
    pub fn close(mut self) -> Result<()> {
        self.released = true;
        self.ops.release(self.session)?;
        debug!(device = self.ops.name(), session = %self.session, "file closed");
        Ok(())
    }
}

impl Drop for FileHandle {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = self.ops.release(self.session) {
            warn!(device = self.ops.name(), session = %self.session, "release on drop failed: {e}");
        }
    }
}

/// Map a device error onto the closest [`io::ErrorKind`].
fn to_io_error(error: Error) -> io::Error {
    let kind = match error {
        Error::AlreadyBusy => io::ErrorKind::ResourceBusy,
        Error::NotSupported { .. } => io::ErrorKind::Unsupported,
        Error::NotOpen => io::ErrorKind::NotConnected,
        Error::Unloading => io::ErrorKind::NotFound,
        Error::CopyFault { .. } | Error::MessageTooLong { .. } => io::ErrorKind::Other,
    };
    io::Error::new(kind, error)
}

impl io::Read for FileHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let len = buf.len();
        let mut sink = SliceSink::new(buf);
        self.ops
            .read(self.session, &mut sink, len)
            .map_err(to_io_error)
    }
}

impl io::Write for FileHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.ops.write(self.session, buf).map_err(to_io_error)? {}
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
