//! Mock caller buffer with fault injection.

use bytes::{BufMut, Bytes, BytesMut};
use chardev_core::Fault;

use crate::traits::UserSink;

/// Bounded buffer owned by a simulated caller.
///
/// Writes past `capacity` fault, as does the write landing on the optional
/// fault offset (an unmapped page in the middle of the buffer).
///
/// # Examples
///
/// ```
/// use chardev_device::UserSink;
/// use chardev_device::mock::UserBuffer;
///
/// let mut buffer = UserBuffer::with_fault_at(16, 2);
/// buffer.put_user(b'o').unwrap();
/// buffer.put_user(b'k').unwrap();
/// assert!(buffer.put_user(b'!').is_err());
/// assert_eq!(buffer.as_bytes(), b"ok");
/// ```
#[derive(Debug, Clone)]
pub struct UserBuffer {
    data: BytesMut,

    /// Bytes the caller made available.
    capacity: usize,

    /// Offset whose write always faults.
    fault_at: Option<usize>,

    /// Faults raised so far.
    faults: usize,
}

impl UserBuffer {
    /// Create a buffer that accepts up to `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(capacity),
            capacity,
            fault_at: None,
            faults: 0,
        }
    }

    /// Create a buffer whose byte at `offset` cannot be written.
    pub fn with_fault_at(capacity: usize, offset: usize) -> Self {
        Self {
            fault_at: Some(offset),
            ..Self::new(capacity)
        }
    }

    /// Make the faulty offset writable again.
    pub fn clear_fault(&mut self) {
        self.fault_at = None;
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes written so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Number of faults raised so far.
    pub fn fault_count(&self) -> usize {
        self.faults
    }

    /// Hand the written bytes back to the caller, emptying the buffer.
    pub fn take(&mut self) -> Bytes {
        self.data.split().freeze()
    }
}

impl UserSink for UserBuffer {
    fn put_user(&mut self, byte: u8) -> Result<(), Fault> {
        let offset = self.data.len();
        if offset >= self.capacity || self.fault_at == Some(offset) {
            self.faults += 1;
            return Err(Fault::at(offset));
        }
        self.data.put_u8(byte);
        Ok(())
    }

    fn position(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_accepts_up_to_capacity() {
        let mut buffer = UserBuffer::new(3);
        for byte in b"abc" {
            buffer.put_user(*byte).unwrap();
        }
        assert_eq!(buffer.put_user(b'd'), Err(Fault::at(3)));
        assert_eq!(buffer.as_bytes(), b"abc");
        assert_eq!(buffer.fault_count(), 1);
    }

    #[test]
    fn test_fault_offset_blocks_until_cleared() {
        let mut buffer = UserBuffer::with_fault_at(8, 1);
        buffer.put_user(b'a').unwrap();
        assert_eq!(buffer.put_user(b'b'), Err(Fault::at(1)));
        assert_eq!(buffer.put_user(b'b'), Err(Fault::at(1)));

        buffer.clear_fault();
        buffer.put_user(b'b').unwrap();
        assert_eq!(buffer.as_bytes(), b"ab");
        assert_eq!(buffer.fault_count(), 2);
    }

    #[test]
    fn test_take_empties_buffer() {
        let mut buffer = UserBuffer::new(8);
        buffer.put_user(b'x').unwrap();

        let taken = buffer.take();
        assert_eq!(&taken[..], b"x");
        assert!(buffer.is_empty());
        assert_eq!(buffer.position(), 0);
    }
}
