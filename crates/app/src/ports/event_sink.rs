//! Event sink port: where adapters push the events they emit.

use std::sync::Arc;

use smarthub_domain::event::DeviceEvent;

/// Receives device events.
///
/// Publishing is fire-and-forget: a sink never reports failure back to the
/// emitting adapter, and must not block.
pub trait EventSink: Send + Sync {
    /// Deliver an event to all current observers.
    fn publish(&self, event: DeviceEvent);
}

impl<T: EventSink + ?Sized> EventSink for Arc<T> {
    fn publish(&self, event: DeviceEvent) {
        (**self).publish(event);
    }
}
