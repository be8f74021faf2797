//! # smarthub-app
//!
//! Application layer: **port definitions** (traits) and the in-process
//! plumbing every adapter composes.
//!
//! ## Responsibilities
//! - Define **port traits**:
//!   - `EventSink`: where adapters push their events
//!   - `Device`: lifecycle surface shared by every adapter
//! - Provide the **emission primitives** (`DeviceEmitter`): one event plus
//!   one structured log record per call
//! - Provide the **initialize-once guard** (`Lifecycle`) that keeps each
//!   adapter at exactly one transport handle
//! - Provide **in-process infrastructure** (event bus) that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `smarthub-domain` only (plus `tokio::sync` for channels).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod emitter;
pub mod event_bus;
pub mod lifecycle;
pub mod ports;
