//! Broker connection monitor.
//!
//! Drives the rumqttc event loop and turns connection state changes into
//! device events. The monitor owns the retained liveness marker: it
//! publishes [`ONLINE`] on every `ConnAck`, while the broker publishes the
//! [`OFFLINE`](crate::topic::OFFLINE) last will if the connection drops
//! uncleanly.
//!
//! On shutdown the monitor keeps polling until every queued publication has
//! been written and its QoS 2 flow completed, then sends the clean
//! `DISCONNECT`, giving up after [`DRAIN_TIMEOUT`]. Brokers release a QoS 2 message only on `PUBREL`, so
//! disconnecting earlier would lose the offline marker.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use rumqttc::{AsyncClient, ClientError, ConnectionError, Event, EventLoop, Outgoing, Packet, QoS};
use tokio::time::Instant;

use smarthub_app::emitter::DeviceEmitter;
use smarthub_app::ports::EventSink;

use crate::error::MqttError;
use crate::topic::{ONLINE, PUBLISH_QOS};

/// Upper bound for completing pending flows once shutdown was requested.
pub(crate) const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

const DRAIN_EXPIRED: &str =
    "MQTT Broker did not complete pending publications before disconnect.";

/// Non-blocking request side of the broker client.
pub trait Publisher: Send + Sync + 'static {
    /// Queue a publish request without waiting for the event loop.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the request queue is full or closed.
    fn try_publish(
        &self,
        topic: &str,
        qos: QoS,
        retain: bool,
        payload: Vec<u8>,
    ) -> Result<(), ClientError>;

    /// Queue a clean disconnect.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the request queue is full or closed.
    fn try_disconnect(&self) -> Result<(), ClientError>;
}

impl Publisher for AsyncClient {
    fn try_publish(
        &self,
        topic: &str,
        qos: QoS,
        retain: bool,
        payload: Vec<u8>,
    ) -> Result<(), ClientError> {
        AsyncClient::try_publish(self, topic, qos, retain, payload)
    }

    fn try_disconnect(&self) -> Result<(), ClientError> {
        AsyncClient::try_disconnect(self)
    }
}

/// State shared between the adapter and its monitor task.
#[derive(Debug, Default)]
pub(crate) struct Link {
    connected: AtomicBool,
    queued: AtomicU64,
    closing: AtomicBool,
    close_after: AtomicU64,
}

impl Link {
    pub(crate) fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Ask the monitor to disconnect once everything queued so far, plus
    /// `upcoming` publications, went out.
    pub(crate) fn request_close(&self, upcoming: u64) {
        let queued = self.queued.load(Ordering::Acquire);
        self.close_after.store(queued + upcoming, Ordering::Release);
        self.closing.store(true, Ordering::Release);
    }

    /// Number of publications that must be written before disconnecting.
    fn close_after(&self) -> Option<u64> {
        self.closing
            .load(Ordering::Acquire)
            .then(|| self.close_after.load(Ordering::Acquire))
    }
}

/// Publisher that counts the requests it queued on the shared [`Link`].
#[derive(Clone)]
pub(crate) struct Outbox<P> {
    inner: P,
    link: Arc<Link>,
}

impl<P> Outbox<P> {
    pub(crate) fn new(inner: P, link: Arc<Link>) -> Self {
        Self { inner, link }
    }
}

impl<P: Publisher> Publisher for Outbox<P> {
    fn try_publish(
        &self,
        topic: &str,
        qos: QoS,
        retain: bool,
        payload: Vec<u8>,
    ) -> Result<(), ClientError> {
        self.inner.try_publish(topic, qos, retain, payload)?;
        self.link.queued.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn try_disconnect(&self) -> Result<(), ClientError> {
        self.inner.try_disconnect()
    }
}

/// What the run loop does after handling one polled event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Backoff,
    Stop,
}

pub(crate) struct ConnectionMonitor<S, P> {
    emitter: DeviceEmitter<S>,
    publisher: P,
    url: String,
    liveness_topic: String,
    link: Arc<Link>,
    /// Publications written to the socket, retransmissions included.
    written: u64,
    /// Packet ids whose QoS 1/2 flow is not complete yet.
    unreleased: HashSet<u16>,
    drain_deadline: Option<Instant>,
    disconnecting: bool,
}

impl<S: EventSink, P: Publisher> ConnectionMonitor<S, P> {
    pub(crate) fn new(
        emitter: DeviceEmitter<S>,
        publisher: P,
        url: String,
        liveness_topic: String,
        link: Arc<Link>,
    ) -> Self {
        Self {
            emitter,
            publisher,
            url,
            liveness_topic,
            link,
            written: 0,
            unreleased: HashSet::new(),
            drain_deadline: None,
            disconnecting: false,
        }
    }

    pub(crate) fn handle(&mut self, polled: Result<Event, ConnectionError>) -> Flow {
        match polled {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                self.link.connected.store(true, Ordering::Release);
                // a reconnect while closing must not flip the marker back online
                let marked = match self.link.close_after() {
                    Some(_) => Ok(()),
                    None => self.publisher.try_publish(
                        &self.liveness_topic,
                        PUBLISH_QOS,
                        true,
                        ONLINE.as_bytes().to_vec(),
                    ),
                };
                if let Err(err) = marked {
                    self.emitter
                        .emit_error(MqttError::Client(err).into_device_error());
                }
                self.emitter.emit_connect(Some(&self.url), None);
                Flow::Continue
            }
            Ok(Event::Outgoing(Outgoing::Publish(pkid))) => {
                self.written += 1;
                if pkid != 0 {
                    self.unreleased.insert(pkid);
                }
                Flow::Continue
            }
            Ok(Event::Incoming(Packet::PubAck(ack))) => {
                self.unreleased.remove(&ack.pkid);
                Flow::Continue
            }
            Ok(Event::Incoming(Packet::PubComp(comp))) => {
                self.unreleased.remove(&comp.pkid);
                Flow::Continue
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                self.link.connected.store(false, Ordering::Release);
                self.emitter.emit_disconnect(Some(&self.url), None);
                Flow::Stop
            }
            Ok(event) => {
                tracing::trace!(url = %self.url, ?event, "mqtt event");
                Flow::Continue
            }
            Err(err) => {
                self.emitter
                    .emit_error(MqttError::Connection(err).into_device_error());
                if self.link.connected.swap(false, Ordering::AcqRel) {
                    self.emitter.emit_disconnect(Some(&self.url), None);
                }
                if self.link.close_after().is_some() {
                    Flow::Stop
                } else {
                    Flow::Backoff
                }
            }
        }
    }

    /// Disconnect once shutdown was requested and every flow completed.
    pub(crate) fn settle(&mut self) -> Flow {
        let Some(close_after) = self.link.close_after() else {
            return Flow::Continue;
        };
        if self.disconnecting {
            return Flow::Continue;
        }
        self.drain_deadline
            .get_or_insert_with(|| Instant::now() + DRAIN_TIMEOUT);
        if self.written >= close_after && self.unreleased.is_empty() {
            self.disconnect()
        } else {
            Flow::Continue
        }
    }

    /// Give up waiting for pending flows and disconnect anyway.
    pub(crate) fn expire(&mut self) -> Flow {
        self.emitter.emit_warning(DRAIN_EXPIRED);
        self.disconnect()
    }

    fn disconnect(&mut self) -> Flow {
        self.disconnecting = true;
        match self.publisher.try_disconnect() {
            Ok(()) => Flow::Continue,
            Err(err) => {
                self.emitter
                    .emit_error(MqttError::Client(err).into_device_error());
                if self.link.connected.swap(false, Ordering::AcqRel) {
                    self.emitter.emit_disconnect(Some(&self.url), None);
                }
                Flow::Stop
            }
        }
    }

    fn step(&mut self, polled: Result<Event, ConnectionError>) -> Flow {
        match self.handle(polled) {
            Flow::Continue => self.settle(),
            flow => flow,
        }
    }

    /// Poll `eventloop` until a clean disconnect went out.
    pub(crate) async fn run(mut self, mut eventloop: EventLoop, reconnect_delay: Duration) {
        loop {
            let flow = match self.drain_deadline.filter(|_| !self.disconnecting) {
                Some(deadline) => match tokio::time::timeout_at(deadline, eventloop.poll()).await {
                    Ok(polled) => self.step(polled),
                    Err(_) => self.expire(),
                },
                None => self.step(eventloop.poll().await),
            };
            match flow {
                Flow::Continue => {}
                Flow::Backoff => tokio::time::sleep(reconnect_delay).await,
                Flow::Stop => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use rumqttc::{ConnAck, ConnectReturnCode, PubComp};
    use tokio::sync::broadcast;

    use smarthub_app::event_bus::InProcessEventBus;
    use smarthub_domain::device::DeviceSource;
    use smarthub_domain::error::ErrorKind;
    use smarthub_domain::event::{DeviceEvent, EventKind};

    use crate::DEVICE_TYPE;
    use crate::topic::OFFLINE;

    type Published = (String, QoS, bool, Vec<u8>);

    #[derive(Clone, Default)]
    struct RecordingPublisher {
        published: Arc<Mutex<Vec<Published>>>,
        disconnects: Arc<Mutex<usize>>,
    }

    impl RecordingPublisher {
        fn disconnects(&self) -> usize {
            *self.disconnects.lock().unwrap()
        }
    }

    impl Publisher for RecordingPublisher {
        fn try_publish(
            &self,
            topic: &str,
            qos: QoS,
            retain: bool,
            payload: Vec<u8>,
        ) -> Result<(), ClientError> {
            self.published
                .lock()
                .unwrap()
                .push((topic.to_string(), qos, retain, payload));
            Ok(())
        }

        fn try_disconnect(&self) -> Result<(), ClientError> {
            *self.disconnects.lock().unwrap() += 1;
            Ok(())
        }
    }

    struct Harness {
        monitor: ConnectionMonitor<InProcessEventBus, Outbox<RecordingPublisher>>,
        outbox: Outbox<RecordingPublisher>,
        recorder: RecordingPublisher,
        link: Arc<Link>,
        rx: broadcast::Receiver<DeviceEvent>,
    }

    fn harness() -> Harness {
        let bus = InProcessEventBus::new(16);
        let rx = bus.subscribe();
        let source = DeviceSource::new(DEVICE_TYPE, "broker.local").unwrap();
        let recorder = RecordingPublisher::default();
        let link = Arc::new(Link::default());
        let outbox = Outbox::new(recorder.clone(), Arc::clone(&link));
        let monitor = ConnectionMonitor::new(
            DeviceEmitter::new(source, bus),
            outbox.clone(),
            "mqtt://broker.local:1883".to_string(),
            "home/connected".to_string(),
            Arc::clone(&link),
        );
        Harness {
            monitor,
            outbox,
            recorder,
            link,
            rx,
        }
    }

    fn conn_ack() -> Result<Event, ConnectionError> {
        Ok(Event::Incoming(Packet::ConnAck(ConnAck {
            session_present: false,
            code: ConnectReturnCode::Success,
        })))
    }

    fn refused() -> Result<Event, ConnectionError> {
        Err(ConnectionError::Io(std::io::Error::other("connection refused")))
    }

    fn written(pkid: u16) -> Result<Event, ConnectionError> {
        Ok(Event::Outgoing(Outgoing::Publish(pkid)))
    }

    fn completed(pkid: u16) -> Result<Event, ConnectionError> {
        Ok(Event::Incoming(Packet::PubComp(PubComp::new(pkid))))
    }

    fn drain_kinds(rx: &mut broadcast::Receiver<DeviceEvent>) -> Vec<EventKind> {
        std::iter::from_fn(|| rx.try_recv().ok())
            .map(|event| event.kind())
            .collect()
    }

    #[test]
    fn should_publish_online_marker_and_emit_connect_on_conn_ack() {
        let mut h = harness();

        assert_eq!(h.monitor.handle(conn_ack()), Flow::Continue);

        let published = h.recorder.published.lock().unwrap().clone();
        assert_eq!(
            published,
            vec![(
                "home/connected".to_string(),
                QoS::ExactlyOnce,
                true,
                b"2".to_vec()
            )]
        );
        assert_eq!(h.rx.try_recv().unwrap().kind(), EventKind::Connect);
        assert!(h.rx.try_recv().is_err());
        assert!(h.link.is_connected());
    }

    #[test]
    fn should_emit_error_only_when_never_connected() {
        let mut h = harness();

        assert_eq!(h.monitor.handle(refused()), Flow::Backoff);

        match h.rx.try_recv().unwrap() {
            DeviceEvent::Error { error, message, .. } => {
                assert_eq!(error.kind(), ErrorKind::Transport);
                assert!(message.contains("connection refused"));
            }
            other => panic!("expected error event, got {other:?}"),
        }
        assert!(h.rx.try_recv().is_err());
    }

    #[test]
    fn should_emit_error_then_disconnect_when_connection_drops() {
        let mut h = harness();
        h.monitor.handle(conn_ack());
        let _ = h.rx.try_recv();

        assert_eq!(h.monitor.handle(refused()), Flow::Backoff);

        assert_eq!(h.rx.try_recv().unwrap().kind(), EventKind::Error);
        assert_eq!(h.rx.try_recv().unwrap().kind(), EventKind::Disconnect);
        assert!(!h.link.is_connected());
    }

    #[test]
    fn should_emit_connect_again_after_reconnect() {
        let mut h = harness();
        h.monitor.handle(conn_ack());
        h.monitor.handle(refused());
        h.monitor.handle(conn_ack());

        assert_eq!(
            drain_kinds(&mut h.rx),
            vec![
                EventKind::Connect,
                EventKind::Error,
                EventKind::Disconnect,
                EventKind::Connect
            ]
        );
    }

    #[test]
    fn should_stop_with_disconnect_after_clean_shutdown() {
        let mut h = harness();
        h.monitor.handle(conn_ack());
        let _ = h.rx.try_recv();

        assert_eq!(
            h.monitor.handle(Ok(Event::Outgoing(Outgoing::Disconnect))),
            Flow::Stop
        );
        assert_eq!(h.rx.try_recv().unwrap().kind(), EventKind::Disconnect);
    }

    #[test]
    fn should_ignore_other_traffic() {
        let mut h = harness();
        assert_eq!(
            h.monitor.handle(Ok(Event::Outgoing(Outgoing::PingReq))),
            Flow::Continue
        );
        assert!(h.rx.try_recv().is_err());
    }

    #[test]
    fn should_not_disconnect_without_close_request() {
        let mut h = harness();
        h.monitor.handle(conn_ack());
        h.monitor.handle(written(1));
        h.monitor.handle(completed(1));

        assert_eq!(h.monitor.settle(), Flow::Continue);
        assert_eq!(h.recorder.disconnects(), 0);
    }

    #[test]
    fn should_disconnect_only_after_offline_marker_completes() {
        let mut h = harness();
        h.monitor.handle(conn_ack());
        h.link.request_close(1);

        // online marker written and completed before the offline one is queued
        h.monitor.handle(written(1));
        h.monitor.handle(completed(1));
        assert_eq!(h.monitor.settle(), Flow::Continue);
        assert_eq!(h.recorder.disconnects(), 0);

        h.outbox
            .try_publish("home/connected", PUBLISH_QOS, true, OFFLINE.as_bytes().to_vec())
            .unwrap();

        // offline marker written, PUBREC seen but PUBCOMP still pending
        h.monitor.handle(written(2));
        h.monitor.handle(Ok(Event::Incoming(Packet::PubRec(rumqttc::PubRec::new(2)))));
        assert_eq!(h.monitor.settle(), Flow::Continue);
        assert_eq!(h.recorder.disconnects(), 0);

        h.monitor.handle(completed(2));
        assert_eq!(h.monitor.settle(), Flow::Continue);
        assert_eq!(h.recorder.disconnects(), 1);

        // a second settle never queues another disconnect
        assert_eq!(h.monitor.settle(), Flow::Continue);
        assert_eq!(h.recorder.disconnects(), 1);
    }

    #[test]
    fn should_warn_and_disconnect_when_flows_do_not_complete_in_time() {
        let mut h = harness();
        h.monitor.handle(conn_ack());
        let _ = h.rx.try_recv();
        h.link.request_close(0);
        h.monitor.handle(written(1));
        assert_eq!(h.monitor.settle(), Flow::Continue);
        assert!(h.monitor.drain_deadline.is_some());

        assert_eq!(h.monitor.expire(), Flow::Continue);

        assert_eq!(h.recorder.disconnects(), 1);
        assert_eq!(h.rx.try_recv().unwrap().kind(), EventKind::Warning);
    }

    #[test]
    fn should_stop_instead_of_reconnecting_while_closing() {
        let mut h = harness();
        h.monitor.handle(conn_ack());
        h.link.request_close(1);

        assert_eq!(h.monitor.handle(refused()), Flow::Stop);
        assert_eq!(
            drain_kinds(&mut h.rx),
            vec![EventKind::Connect, EventKind::Error, EventKind::Disconnect]
        );
    }

    #[test]
    fn should_close_after_queued_and_upcoming_publications() {
        let h = harness();
        h.outbox
            .try_publish("home/a", PUBLISH_QOS, false, b"1".to_vec())
            .unwrap();
        h.link.request_close(1);
        assert_eq!(h.link.close_after(), Some(2));
    }
}
