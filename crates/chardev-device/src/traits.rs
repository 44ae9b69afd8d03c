//! Trait definitions at the device/host boundary.
//!
//! [`FileOperations`] is the capability table a host dispatches through.
//! [`UserSink`] is the caller-owned destination of a read: the device can
//! only push bytes into it one at a time, and every push may fail.

use std::convert::Infallible;

use chardev_core::{Fault, Result, SessionId};

/// Destination of a read, living on the caller's side of the boundary.
///
/// Implementations track their own write position, so successive calls
/// fill consecutive bytes, like `put_user(*p++, buffer++)` in a driver.
///
/// # Examples
///
/// ```
/// use chardev_device::UserSink;
///
/// let mut out: Vec<u8> = Vec::new();
/// out.put_user(b'h').unwrap();
/// out.put_user(b'i').unwrap();
/// assert_eq!(out, b"hi");
/// ```
pub trait UserSink {
    /// Copy one byte to the next position of the destination.
    ///
    /// # Errors
    ///
    /// Returns a [`Fault`] if the byte cannot be written. The position does
    /// not advance on failure.
    fn put_user(&mut self, byte: u8) -> std::result::Result<(), Fault>;

    /// Number of bytes written so far.
    fn position(&self) -> usize;
}

/// Host-internal buffers never fault.
impl UserSink for Vec<u8> {
    fn put_user(&mut self, byte: u8) -> std::result::Result<(), Fault> {
        self.push(byte);
        Ok(())
    }

    fn position(&self) -> usize {
        self.len()
    }
}

impl<S: UserSink + ?Sized> UserSink for &mut S {
    fn put_user(&mut self, byte: u8) -> std::result::Result<(), Fault> {
        (**self).put_user(byte)
    }

    fn position(&self) -> usize {
        (**self).position()
    }
}

/// A fixed-size caller buffer.
///
/// Writing past the end of the slice faults, the way touching memory past
/// the end of a user buffer would.
///
/// ```
/// use chardev_device::{SliceSink, UserSink};
///
/// let mut raw = [0u8; 2];
/// let mut sink = SliceSink::new(&mut raw);
/// assert!(sink.put_user(b'a').is_ok());
/// assert!(sink.put_user(b'b').is_ok());
/// assert!(sink.put_user(b'c').is_err());
/// assert_eq!(sink.filled(), b"ab");
/// ```
#[derive(Debug)]
pub struct SliceSink<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> SliceSink<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// The bytes written so far.
    pub fn filled(&self) -> &[u8] {
        &self.buf[..self.pos]
    }
}

impl UserSink for SliceSink<'_> {
    fn put_user(&mut self, byte: u8) -> std::result::Result<(), Fault> {
        let slot = self.buf.get_mut(self.pos).ok_or(Fault::at(self.pos))?;
        *slot = byte;
        self.pos += 1;
        Ok(())
    }

    fn position(&self) -> usize {
        self.pos
    }
}

/// Capability table a host binds a character device through.
///
/// Every call carries the [`SessionId`] of the open file it is made on.
/// Operations are synchronous and never block on another session.
pub trait FileOperations: Send + Sync {
    /// Name the device registers under.
    fn name(&self) -> &str;

    /// Begin a session.
    ///
    /// # Errors
    ///
    /// [`AlreadyBusy`](chardev_core::Error::AlreadyBusy) if another session
    /// holds the device.
    fn open(&self, session: SessionId) -> Result<()>;

    /// Copy up to `len` bytes of the session's message into `sink`.
    ///
    /// Returns the number of bytes copied; `0` means end-of-stream.
    ///
    /// # Errors
    ///
    /// [`NotOpen`](chardev_core::Error::NotOpen) if `session` does not hold
    /// the device, [`CopyFault`](chardev_core::Error::CopyFault) if the sink
    /// rejects a byte.
    fn read(&self, session: SessionId, sink: &mut dyn UserSink, len: usize) -> Result<usize>;

    /// Write to the device. Read-only devices never succeed.
    fn write(&self, session: SessionId, data: &[u8]) -> Result<Infallible>;

    /// End a session.
    ///
    /// # Errors
    ///
    /// [`NotOpen`](chardev_core::Error::NotOpen) if `session` does not hold
    /// the device.
    fn release(&self, session: SessionId) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_sink_appends() {
        let mut out = vec![b'x'];
        out.put_user(b'y').unwrap();
        assert_eq!(out, b"xy");
        assert_eq!(out.position(), 2);
    }

    #[test]
    fn test_slice_sink_faults_past_end() {
        let mut raw = [0u8; 1];
        let mut sink = SliceSink::new(&mut raw);

        sink.put_user(b'a').unwrap();
        let fault = sink.put_user(b'b').unwrap_err();

        assert_eq!(fault, Fault::at(1));
        assert_eq!(sink.position(), 1);
        assert_eq!(sink.filled(), b"a");
    }

    #[test]
    fn test_empty_slice_sink_faults_immediately() {
        let mut raw: [u8; 0] = [];
        let mut sink = SliceSink::new(&mut raw);
        assert_eq!(sink.put_user(b'a'), Err(Fault::at(0)));
    }

    #[test]
    fn test_mut_ref_forwards() {
        fn fill<S: UserSink>(mut sink: S) -> usize {
            sink.put_user(b'z').unwrap();
            sink.position()
        }

        let mut out: Vec<u8> = Vec::new();
        assert_eq!(fill(&mut out), 1);
        assert_eq!(out, b"z");
    }
}
