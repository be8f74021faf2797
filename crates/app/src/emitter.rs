//! Emission primitives shared by every adapter.
//!
//! [`DeviceEmitter`] pairs a device identity with an [`EventSink`]. Each
//! primitive publishes exactly one [`DeviceEvent`] and writes one `tracing`
//! record tagged with the device type and address. Primitives never fail.

use std::sync::Arc;

use smarthub_domain::device::DeviceSource;
use smarthub_domain::error::DeviceError;
use smarthub_domain::event::DeviceEvent;
use smarthub_domain::payload::Payload;

use crate::ports::EventSink;

/// Publishes events on behalf of one device.
pub struct DeviceEmitter<S> {
    source: Arc<DeviceSource>,
    sink: S,
}

impl<S: Clone> Clone for DeviceEmitter<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            sink: self.sink.clone(),
        }
    }
}

impl<S: EventSink> DeviceEmitter<S> {
    /// Create an emitter for `source` publishing into `sink`.
    pub fn new(source: DeviceSource, sink: S) -> Self {
        Self {
            source: Arc::new(source),
            sink,
        }
    }

    /// Identity attached to every emitted event.
    #[must_use]
    pub fn source(&self) -> &DeviceSource {
        &self.source
    }

    fn device_type(&self) -> &str {
        self.source.device_type()
    }

    fn address(&self) -> &str {
        self.source.address()
    }

    /// Report that the transport connected and/or bound.
    pub fn emit_connect(&self, connect_to: Option<&str>, bind_on: Option<&str>) {
        self.sink.publish(DeviceEvent::Connect {
            source: Arc::clone(&self.source),
        });
        if let Some(target) = connect_to {
            tracing::debug!(
                device_type = self.device_type(),
                address = self.address(),
                "connect to {target}"
            );
        }
        if let Some(target) = bind_on {
            tracing::debug!(
                device_type = self.device_type(),
                address = self.address(),
                "bind on {target}"
            );
        }
    }

    /// Report that the transport disconnected and/or unbound.
    pub fn emit_disconnect(&self, disconnect_from: Option<&str>, unbind_from: Option<&str>) {
        self.sink.publish(DeviceEvent::Disconnect {
            source: Arc::clone(&self.source),
        });
        if let Some(target) = disconnect_from {
            tracing::debug!(
                device_type = self.device_type(),
                address = self.address(),
                "disconnect from {target}"
            );
        }
        if let Some(target) = unbind_from {
            tracing::debug!(
                device_type = self.device_type(),
                address = self.address(),
                "unbind from {target}"
            );
        }
    }

    pub fn emit_info(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(
            device_type = self.device_type(),
            address = self.address(),
            "{message}"
        );
        self.sink.publish(DeviceEvent::Info {
            source: Arc::clone(&self.source),
            message,
        });
    }

    pub fn emit_warning(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(
            device_type = self.device_type(),
            address = self.address(),
            "{message}"
        );
        self.sink.publish(DeviceEvent::Warning {
            source: Arc::clone(&self.source),
            message,
        });
    }

    /// Report a setup or transport failure.
    ///
    /// The event message is the error rendered with its full source chain.
    pub fn emit_error(&self, error: DeviceError) {
        let message = error.chain_message();
        tracing::error!(
            device_type = self.device_type(),
            address = self.address(),
            kind = ?error.kind(),
            "{message}"
        );
        self.sink.publish(DeviceEvent::Error {
            source: Arc::clone(&self.source),
            message,
            error: Arc::new(error),
        });
    }

    /// Report that `message` was handed to the transport for `send_to`.
    pub fn emit_send(&self, send_to: impl Into<String>, message: impl Into<Payload>) {
        let send_to = send_to.into();
        let message = message.into();
        tracing::info!(
            device_type = self.device_type(),
            address = self.address(),
            "send to {send_to} => {message}"
        );
        self.sink.publish(DeviceEvent::Send {
            source: Arc::clone(&self.source),
            send_to,
            message,
        });
    }

    /// Report that `message` arrived from `receive_from`.
    pub fn emit_receive(&self, receive_from: impl Into<String>, message: impl Into<Payload>) {
        let receive_from = receive_from.into();
        let message = message.into();
        tracing::info!(
            device_type = self.device_type(),
            address = self.address(),
            "received from {receive_from} => {message}"
        );
        self.sink.publish(DeviceEvent::Receive {
            source: Arc::clone(&self.source),
            receive_from,
            message,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use smarthub_domain::error::ErrorKind;
    use smarthub_domain::event::EventKind;
    use smarthub_domain::message::DeviceMessage;

    #[derive(Clone, Default)]
    struct RecordingSink(Arc<Mutex<Vec<DeviceEvent>>>);

    impl RecordingSink {
        fn events(&self) -> Vec<DeviceEvent> {
            self.0.lock().unwrap().clone()
        }
    }

    impl EventSink for RecordingSink {
        fn publish(&self, event: DeviceEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    fn emitter() -> (DeviceEmitter<RecordingSink>, RecordingSink) {
        let sink = RecordingSink::default();
        let source = DeviceSource::new("LoxoneMiniserver", "10.0.0.5").unwrap();
        (DeviceEmitter::new(source, sink.clone()), sink)
    }

    #[test]
    fn should_emit_single_connect_event_for_both_targets() {
        let (emitter, sink) = emitter();
        emitter.emit_connect(Some("10.0.0.5:4000"), Some("udp://0.0.0.0:4001"));

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind(), EventKind::Connect);
        assert_eq!(events[0].source().device_type(), "LoxoneMiniserver");
    }

    #[test]
    fn should_emit_disconnect_without_targets() {
        let (emitter, sink) = emitter();
        emitter.emit_disconnect(None, None);
        assert_eq!(sink.events()[0].kind(), EventKind::Disconnect);
    }

    #[test]
    fn should_carry_message_on_info_and_warning() {
        let (emitter, sink) = emitter();
        emitter.emit_info("ready");
        emitter.emit_warning("not initialized");

        let events = sink.events();
        assert!(matches!(&events[0], DeviceEvent::Info { message, .. } if message == "ready"));
        assert!(
            matches!(&events[1], DeviceEvent::Warning { message, .. } if message == "not initialized")
        );
    }

    #[test]
    fn should_emit_error_on_its_own_variant() {
        let (emitter, sink) = emitter();
        let io = std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use");
        emitter.emit_error(DeviceError::setup(io));

        let events = sink.events();
        assert_eq!(events.len(), 1);
        match &events[0] {
            DeviceEvent::Error { message, error, .. } => {
                assert_eq!(message, "transport setup failed: address in use");
                assert_eq!(error.kind(), ErrorKind::Setup);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn should_emit_send_and_receive_with_payload() {
        let (emitter, sink) = emitter();
        let msg = DeviceMessage::new("kitchen", "light", "on");
        emitter.emit_send("10.0.0.5:4000", msg.clone());
        emitter.emit_receive("10.0.0.5", msg.clone());

        let events = sink.events();
        match &events[0] {
            DeviceEvent::Send {
                send_to, message, ..
            } => {
                assert_eq!(send_to, "10.0.0.5:4000");
                assert_eq!(message, &Payload::Message(msg.clone()));
            }
            other => panic!("unexpected event {other:?}"),
        }
        match &events[1] {
            DeviceEvent::Receive {
                receive_from,
                message,
                ..
            } => {
                assert_eq!(receive_from, "10.0.0.5");
                assert_eq!(message, &Payload::Message(msg));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn should_share_source_between_clones() {
        let (emitter, sink) = emitter();
        let clone = emitter.clone();
        clone.emit_info("from clone");
        assert_eq!(sink.events().len(), 1);
        assert_eq!(clone.source(), emitter.source());
    }
}
