//! Device port: lifecycle surface shared by every transport adapter.
//!
//! Each adapter also exposes its own protocol-specific `send`; those differ
//! in arity and are not part of this trait.

use smarthub_domain::device::DeviceSource;

/// A transport adapter that reports through events.
///
/// The wiring layer drives adapters in this order:
///
/// 1. [`initialize`](Self::initialize): build the transport handle once
/// 2. (the application sends through the adapter's own `send`)
/// 3. [`shutdown`](Self::shutdown): release background work on exit
///
/// None of these calls block or return errors; outcomes arrive as events.
pub trait Device: Send + Sync {
    /// Identity used to tag events and log lines.
    fn source(&self) -> &DeviceSource;

    /// Build the transport handle. A no-op once initialized.
    fn initialize(&self);

    /// Whether a transport handle has been fully constructed.
    fn is_initialized(&self) -> bool;

    /// Stop background work owned by the adapter.
    fn shutdown(&self);
}
