//! Module pinning.
//!
//! A [`ModulePin`] counts the references that keep the owning module
//! loaded. Each open session holds one [`PinGuard`]; dropping the guard
//! gives the reference back, so a session can only ever release its pin
//! once.
//!
//! Unloading is a one-way switch: [`ModulePin::begin_unload`] succeeds only
//! when no reference is outstanding, and from then on
//! [`ModulePin::try_acquire`] refuses new references. Both checks act on the
//! same atomic word, so an open cannot slip in between the zero-refs check
//! and the unload.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{debug, trace};

/// High bit of the state word, set once unloading has begun.
const GOING: usize = 1 << (usize::BITS - 1);

/// Reference count keeping a module loaded.
///
/// # Examples
///
/// ```
/// use chardev_device::ModulePin;
///
/// let pin = ModulePin::new("chardev");
/// let guard = pin.try_acquire().unwrap();
/// assert_eq!(pin.count(), 1);
/// assert_eq!(pin.begin_unload(), Err(1));
///
/// drop(guard);
/// assert_eq!(pin.begin_unload(), Ok(()));
/// assert!(pin.try_acquire().is_none());
/// ```
#[derive(Debug)]
pub struct ModulePin {
    /// Module name, for diagnostics.
    name: String,

    /// Outstanding references, plus the [`GOING`] bit.
    state: AtomicUsize,
}

impl ModulePin {
    /// Create an unpinned module reference count.
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            state: AtomicUsize::new(0),
        })
    }

    /// Take a reference on the module, unless it is being unloaded.
    pub fn try_acquire(self: &Arc<Self>) -> Option<PinGuard> {
        let prev = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |state| {
                (state & GOING == 0).then_some(state + 1)
            });

        match prev {
            Ok(prev) => {
                trace!(module = %self.name, refs = prev + 1, "module pinned");
                Some(PinGuard {
                    pin: Arc::clone(self),
                })
            }
            Err(_) => {
                debug!(module = %self.name, "pin refused, module unloading");
                None
            }
        }
    }

    /// Mark the module as going away if nothing references it.
    ///
    /// Returns the outstanding reference count on refusal.
    pub fn begin_unload(&self) -> Result<(), usize> {
        self.state
            .compare_exchange(0, GOING, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|state| state & !GOING)
    }

    /// Undo [`begin_unload`](Self::begin_unload) after a failed unload.
    pub fn cancel_unload(&self) {
        self.state.fetch_and(!GOING, Ordering::AcqRel);
    }

    /// Current number of references.
    pub fn count(&self) -> usize {
        self.state.load(Ordering::Acquire) & !GOING
    }

    /// Whether any reference is outstanding.
    pub fn is_pinned(&self) -> bool {
        self.count() > 0
    }

    /// Whether unloading has begun.
    pub fn is_going(&self) -> bool {
        self.state.load(Ordering::Acquire) & GOING != 0
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// One reference on a [`ModulePin`], released on drop.
#[derive(Debug)]
#[must_use = "dropping the guard releases the pin immediately"]
pub struct PinGuard {
    pin: Arc<ModulePin>,
}

impl Drop for PinGuard {
    fn drop(&mut self) {
        let refs = (self.pin.state.fetch_sub(1, Ordering::AcqRel) & !GOING) - 1;
        trace!(module = %self.pin.name, refs, "module unpinned");
    }
}
