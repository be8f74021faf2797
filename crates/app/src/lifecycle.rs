//! Initialize-once guard for adapter transport handles.
//!
//! An adapter owns at most one transport handle. [`Lifecycle`] hands out a
//! single claim with an atomic compare-exchange, publishes the handle only
//! once it is fully built, and releases the claim when setup fails so a
//! later `initialize()` can retry.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

/// Outcome of [`Lifecycle::initialize`].
#[derive(Debug)]
pub enum Initialize<'a, T, E> {
    /// This call built the handle.
    Ready(&'a T),
    /// Setup failed; the lifecycle is claimable again.
    Failed(E),
    /// Another call already initialized, or is initializing, the handle.
    Skipped,
}

/// Holds a transport handle that is built at most once.
#[derive(Debug)]
pub struct Lifecycle<T> {
    claimed: AtomicBool,
    handle: OnceLock<T>,
}

impl<T> Default for Lifecycle<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Lifecycle<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            claimed: AtomicBool::new(false),
            handle: OnceLock::new(),
        }
    }

    /// Run `setup` unless a handle exists or another caller holds the claim.
    pub fn initialize<E>(&self, setup: impl FnOnce() -> Result<T, E>) -> Initialize<'_, T, E> {
        if self
            .claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Initialize::Skipped;
        }

        match setup() {
            Ok(handle) => Initialize::Ready(self.handle.get_or_init(|| handle)),
            Err(err) => {
                self.claimed.store(false, Ordering::Release);
                Initialize::Failed(err)
            }
        }
    }

    /// The handle, once fully constructed.
    #[must_use]
    pub fn get(&self) -> Option<&T> {
        self.handle.get()
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.handle.get().is_some()
    }
}
