//! In-process event bus backed by a tokio broadcast channel.

use tokio::sync::broadcast;

use smarthub_domain::event::DeviceEvent;

use crate::ports::EventSink;

/// In-process event bus using a tokio [`broadcast`] channel.
///
/// Publishing succeeds even when there are no active subscribers
/// (the event is simply dropped). Cloning yields another handle to the
/// same channel.
#[derive(Clone)]
pub struct InProcessEventBus {
    sender: broadcast::Sender<DeviceEvent>,
}

impl InProcessEventBus {
    /// Create a new event bus with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events on this bus.
    ///
    /// Returns a receiver that will get all events published *after*
    /// the subscription is created.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.sender.subscribe()
    }
}

impl EventSink for InProcessEventBus {
    fn publish(&self, event: DeviceEvent) {
        // broadcast::send fails only when there are zero receivers.
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use smarthub_domain::device::DeviceSource;
    use smarthub_domain::event::EventKind;

    fn connect() -> DeviceEvent {
        DeviceEvent::Connect {
            source: Arc::new(DeviceSource::new("MqttBroker", "localhost").unwrap()),
        }
    }

    fn info(message: &str) -> DeviceEvent {
        DeviceEvent::Info {
            source: Arc::new(DeviceSource::new("MqttBroker", "localhost").unwrap()),
            message: message.to_string(),
        }
    }

    #[tokio::test]
    async fn should_deliver_event_to_subscriber() {
        let bus = InProcessEventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(connect());

        let received = rx.recv().await.unwrap();
        assert_eq!(received.kind(), EventKind::Connect);
    }

    #[tokio::test]
    async fn should_deliver_event_to_multiple_subscribers() {
        let bus = InProcessEventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(info("hello"));

        let r1 = rx1.recv().await.unwrap();
        let r2 = rx2.recv().await.unwrap();
        assert_eq!(r1.kind(), EventKind::Info);
        assert_eq!(r2.kind(), EventKind::Info);
    }

    #[test]
    fn should_succeed_when_no_subscribers() {
        let bus = InProcessEventBus::new(16);
        bus.publish(connect());
    }

    #[tokio::test]
    async fn should_not_deliver_events_published_before_subscription() {
        let bus = InProcessEventBus::new(16);
        bus.publish(info("early"));

        let mut rx = bus.subscribe();
        bus.publish(info("late"));

        match rx.recv().await.unwrap() {
            DeviceEvent::Info { message, .. } => assert_eq!(message, "late"),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn should_share_channel_between_clones() {
        let bus = InProcessEventBus::new(16);
        let mut rx = bus.subscribe();

        let clone = bus.clone();
        clone.publish(connect());

        assert_eq!(rx.recv().await.unwrap().kind(), EventKind::Connect);
    }

    #[tokio::test]
    async fn should_publish_through_arc() {
        let bus = Arc::new(InProcessEventBus::new(16));
        let mut rx = bus.subscribe();

        EventSink::publish(&bus, connect());

        assert_eq!(rx.recv().await.unwrap().kind(), EventKind::Connect);
    }
}
