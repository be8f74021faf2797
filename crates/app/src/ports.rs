//! Port definitions: traits that adapters implement or consume.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the wiring layer and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod device;
pub mod event_sink;

pub use device::Device;
pub use event_sink::EventSink;
