//! The read-only, single-session device state machine.
//!
//! # States
//!
//! - `Closed`: no session holds the device (initial state).
//! - `Open`: exactly one session holds the device.
//!
//! # Transitions
//!
//! - Closed → Open on `open`, rendering a new message.
//! - Open → Closed on `release` by the holding session.
//! - `open` while Open fails with `AlreadyBusy`.
//! - `write` fails with `NotSupported` in every state.
//!
//! # Examples
//!
//! ```
//! use chardev_core::{DeviceState, Error, SessionId};
//! use chardev_device::{FileOperations, HelloDevice, ModulePin};
//!
//! let device = HelloDevice::new("chardev", ModulePin::new("chardev"));
//! let (first, second) = (SessionId::next(), SessionId::next());
//!
//! device.open(first)?;
//! assert_eq!(device.open(second), Err(Error::AlreadyBusy));
//!
//! let mut out: Vec<u8> = Vec::new();
//! assert_eq!(device.read(first, &mut out, 5)?, 5);
//! assert_eq!(out, b"I alr");
//!
//! device.release(first)?;
//! assert_eq!(device.state(), DeviceState::Closed);
//! # Ok::<(), Error>(())
//! ```

use std::convert::Infallible;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chardev_core::constants::{BUF_LEN, MESSAGE_PREFIX, MESSAGE_SUFFIX};
use chardev_core::{DeviceState, DeviceStatus, Error, Result, SessionId};
use tracing::{debug, trace, warn};

use crate::pin::{ModulePin, PinGuard};
use crate::traits::{FileOperations, UserSink};

/// Render the message served to a session.
///
/// `told` is the number of opens that succeeded before this one.
///
/// ```
/// use chardev_device::render_message;
///
/// assert_eq!(render_message(2), "I already told you 2 times Hello world!\n");
/// ```
pub fn render_message(told: u64) -> String {
    format!("{MESSAGE_PREFIX}{told}{MESSAGE_SUFFIX}")
}

/// The session currently holding the device.
#[derive(Debug)]
struct Holder {
    session: SessionId,

    /// Keeps the owning module loaded until the session is released.
    _pin: PinGuard,
}

#[derive(Debug, Default)]
struct Inner {
    /// `Some` exactly while the device is open.
    holder: Option<Holder>,

    /// Successful opens so far. Never reset.
    open_count: u64,

    /// Message of the current (or most recent) session.
    message: Vec<u8>,

    /// Next unread byte of `message`.
    cursor: usize,
}

impl Inner {
    fn state(&self) -> DeviceState {
        if self.holder.is_some() {
            DeviceState::Open
        } else {
            DeviceState::Closed
        }
    }

    fn check_holder(&self, session: SessionId) -> Result<()> {
        match &self.holder {
            Some(holder) if holder.session == session => Ok(()),
            _ => Err(Error::NotOpen),
        }
    }

    fn remaining(&self) -> usize {
        self.message.len() - self.cursor
    }
}

/// Read-only character device serving one session at a time.
///
/// Each successful open renders `"I already told you {N} times Hello world!\n"`,
/// where `N` counts the opens that came before it, and rewinds the read
/// cursor. Reads drain that message; once it is exhausted they return `0`
/// until the next open.
#[derive(Debug)]
pub struct HelloDevice {
    name: String,

    /// Maximum rendered message length in bytes.
    capacity: usize,

    /// Reference count of the owning module.
    pin: Arc<ModulePin>,

    inner: Mutex<Inner>,
}

impl HelloDevice {
    /// Create a closed device with the default message buffer length.
    pub fn new(name: impl Into<String>, pin: Arc<ModulePin>) -> Self {
        Self::with_capacity(name, pin, BUF_LEN)
    }

    /// Create a closed device whose messages may not exceed `capacity` bytes.
    pub fn with_capacity(name: impl Into<String>, pin: Arc<ModulePin>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            capacity,
            pin,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn state(&self) -> DeviceState {
        self.lock().state()
    }

    pub fn is_open(&self) -> bool {
        self.state() == DeviceState::Open
    }

    /// Number of successful opens so far.
    pub fn open_count(&self) -> u64 {
        self.lock().open_count
    }

    /// Offset of the next unread byte.
    pub fn cursor(&self) -> usize {
        self.lock().cursor
    }

    /// Copy of the current session's message.
    pub fn message(&self) -> Vec<u8> {
        self.lock().message.clone()
    }

    /// Session currently holding the device, if any.
    pub fn holder(&self) -> Option<SessionId> {
        self.lock().holder.as_ref().map(|h| h.session)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The module reference count this device pins while open.
    pub fn pin(&self) -> &Arc<ModulePin> {
        &self.pin
    }

    /// Snapshot of the device for diagnostics.
    pub fn status(&self) -> DeviceStatus {
        let inner = self.lock();
        DeviceStatus {
            state: inner.state(),
            open_count: inner.open_count,
            cursor: inner.cursor,
            message_len: inner.message.len(),
            pins: self.pin.count(),
        }
    }

    /// Lock the state machine.
    ///
    /// Nothing panics while the lock is held, and every mutation leaves the
    /// state consistent, so a poisoned lock is safe to keep using.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl FileOperations for HelloDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self, session: SessionId) -> Result<()> {
        let mut inner = self.lock();

        if let Some(holder) = &inner.holder {
            debug!(device = %self.name, %session, holder = %holder.session, "open refused, device busy");
            return Err(Error::AlreadyBusy);
        }

        let message = render_message(inner.open_count);
        if message.len() > self.capacity {
            warn!(
                device = %self.name,
                len = message.len(),
                capacity = self.capacity,
                "message does not fit buffer"
            );
            return Err(Error::MessageTooLong {
                len: message.len(),
                capacity: self.capacity,
            });
        }

        let Some(pin) = self.pin.try_acquire() else {
            warn!(device = %self.name, %session, "open refused, module unloading");
            return Err(Error::Unloading);
        };

        inner.holder = Some(Holder { session, _pin: pin });
        inner.message = message.into_bytes();
        inner.cursor = 0;
        inner.open_count += 1;

        debug!(device = %self.name, %session, open_count = inner.open_count, "device opened");
        Ok(())
    }

    fn read(&self, session: SessionId, sink: &mut dyn UserSink, len: usize) -> Result<usize> {
        let mut inner = self.lock();
        inner.check_holder(session)?;

        if inner.remaining() == 0 {
            trace!(device = %self.name, %session, "end of stream");
            return Ok(0);
        }

        let mut transferred = 0;
        while transferred < len && inner.remaining() > 0 {
            let byte = inner.message[inner.cursor];
            if let Err(fault) = sink.put_user(byte) {
                warn!(device = %self.name, %session, transferred, %fault, "copy to caller failed");
                return Err(Error::copy_fault(transferred));
            }
            inner.cursor += 1;
            transferred += 1;
        }

        trace!(device = %self.name, %session, transferred, cursor = inner.cursor, "read");
        Ok(transferred)
    }

    fn write(&self, session: SessionId, data: &[u8]) -> Result<Infallible> {
        warn!(
            device = %self.name,
            %session,
            len = data.len(),
            "write rejected, this operation isn't supported"
        );
        Err(Error::not_supported("write"))
    }

    fn release(&self, session: SessionId) -> Result<()> {
        let mut inner = self.lock();
        inner.check_holder(session)?;

        // Dropping the holder gives back the module pin.
        inner.holder = None;

        debug!(device = %self.name, %session, "device released");
        Ok(())
    }
}
