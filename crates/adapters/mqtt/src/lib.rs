//! # smarthub-adapter-mqtt
//!
//! MQTT adapter: publishes thing values to a broker and maintains a
//! retained liveness marker.
//!
//! ## How it works
//!
//! [`MqttBroker::initialize`] builds a rumqttc client whose last will sets
//! `<prefix>/connected` to `"0"`, then spawns a monitor that drives the event
//! loop. On every broker `ConnAck` the monitor publishes `"2"` to the same
//! topic (retained) and emits `Connect`. Values go out through
//! [`MqttBroker::send`] as JSON envelopes; see [`topic`] for the layout.
//!
//! All publications use QoS 2. Sends are fire-and-forget: the `Send` event is
//! emitted when the request is queued, and queueing failures surface as a
//! separate `Error` event.
//!
//! ## Dependency rule
//!
//! Same as other adapters: depends on `smarthub-app` and `smarthub-domain`.

mod config;
mod connection;
mod error;
pub mod topic;

pub use config::MqttConfig;
pub use connection::Publisher;
pub use error::MqttError;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rumqttc::{AsyncClient, LastWill, MqttOptions};
use tokio::runtime::Handle;
use tokio::task::AbortHandle;

use smarthub_app::emitter::DeviceEmitter;
use smarthub_app::lifecycle::{Initialize, Lifecycle};
use smarthub_app::ports::{Device, EventSink};
use smarthub_domain::device::DeviceSource;
use smarthub_domain::thing::Thing;
use smarthub_domain::time::epoch_millis;

use crate::connection::{ConnectionMonitor, Link, Outbox};
use crate::topic::{OFFLINE, PUBLISH_QOS};

/// Type tag used for events and log lines.
pub const DEVICE_TYPE: &str = "MqttBroker";

const NOT_INITIALIZED: &str = "MQTT Broker not initialized, unable to publish message.";

struct Session {
    outbox: Outbox<AsyncClient>,
    monitor: AbortHandle,
    link: Arc<Link>,
}

/// Connection to an MQTT broker.
pub struct MqttBroker<S> {
    config: MqttConfig,
    client_id: String,
    emitter: DeviceEmitter<S>,
    session: Lifecycle<Session>,
    closing: AtomicBool,
}

impl<S: EventSink + Clone + 'static> MqttBroker<S> {
    /// Create an uninitialized adapter publishing its events into `sink`.
    ///
    /// Without a configured `client_id` a random `smarthub-xxxxxxxx` id is
    /// picked once, here.
    ///
    /// # Errors
    ///
    /// Returns [`MqttError::Config`] when the configuration does not validate.
    pub fn new(config: MqttConfig, sink: S) -> Result<Self, MqttError> {
        config.validate()?;
        let source = DeviceSource::new(DEVICE_TYPE, config.host.clone())?;
        let client_id = config.client_id.clone().unwrap_or_else(|| {
            let id = uuid::Uuid::new_v4().simple().to_string();
            format!("smarthub-{}", &id[..8])
        });
        Ok(Self {
            config,
            client_id,
            emitter: DeviceEmitter::new(source, sink),
            session: Lifecycle::new(),
            closing: AtomicBool::new(false),
        })
    }

    /// Broker URL, e.g. `mqtt://broker.local:1883`.
    #[must_use]
    pub fn url(&self) -> String {
        format!("mqtt://{}:{}", self.config.host, self.config.port)
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Whether the broker acknowledged the current connection.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.session
            .get()
            .is_some_and(|session| session.link.is_connected())
    }

    /// Publish `value` of `thing` to `<prefix>/<topic>/<thing.name>`.
    ///
    /// Emits `Send` for every queued request. Emits an additional `Error`
    /// when the client rejects the request, and only a `Warning` when the
    /// adapter is not initialized.
    pub fn send(&self, thing: &Thing, topic: &str, value: &str, retain: bool) {
        let Some(session) = self.session.get() else {
            self.emitter.emit_warning(NOT_INITIALIZED);
            return;
        };
        self.publish_with(&session.outbox, thing, topic, value, retain);
    }

    fn publish_with<P: Publisher>(
        &self,
        publisher: &P,
        thing: &Thing,
        topic: &str,
        value: &str,
        retain: bool,
    ) {
        let publication = match topic::build_publication(
            &self.config.topic,
            thing,
            topic,
            value,
            retain,
            epoch_millis(),
        ) {
            Ok(publication) => publication,
            Err(err) => {
                self.emitter
                    .emit_error(MqttError::Serialize(err).into_device_error());
                return;
            }
        };

        let queued = publisher.try_publish(
            &publication.topic,
            PUBLISH_QOS,
            publication.retain,
            publication.message.clone().into_bytes(),
        );
        self.emitter.emit_send(self.url(), publication);
        if let Err(err) = queued {
            self.emitter
                .emit_error(MqttError::Client(err).into_device_error());
        }
    }

    fn options(&self) -> MqttOptions {
        let mut options =
            MqttOptions::new(&self.client_id, &self.config.host, self.config.port);
        options.set_keep_alive(Duration::from_secs(u64::from(self.config.keep_alive_secs)));
        options.set_last_will(LastWill::new(
            topic::liveness_topic(&self.config.topic),
            OFFLINE,
            PUBLISH_QOS,
            true,
        ));
        options
    }

    fn connect(&self) -> Result<Session, MqttError> {
        let runtime = Handle::try_current().map_err(MqttError::NoRuntime)?;
        let (client, eventloop) = AsyncClient::new(self.options(), self.config.request_capacity);
        let link = Arc::new(Link::default());
        let outbox = Outbox::new(client, Arc::clone(&link));

        let monitor = ConnectionMonitor::new(
            self.emitter.clone(),
            outbox.clone(),
            self.url(),
            topic::liveness_topic(&self.config.topic),
            Arc::clone(&link),
        );
        let reconnect_delay = Duration::from_millis(self.config.reconnect_delay_ms);
        let task = runtime.spawn(monitor.run(eventloop, reconnect_delay));

        Ok(Session {
            outbox,
            monitor: task.abort_handle(),
            link,
        })
    }
}

impl<S: EventSink + Clone + 'static> Device for MqttBroker<S> {
    fn source(&self) -> &DeviceSource {
        self.emitter.source()
    }

    fn initialize(&self) {
        match self.session.initialize(|| self.connect()) {
            Initialize::Ready(_) => {
                tracing::debug!(
                    url = %self.url(),
                    client_id = %self.client_id,
                    "connecting to MQTT broker"
                );
            }
            Initialize::Failed(err) => self.emitter.emit_error(err.into_device_error()),
            Initialize::Skipped => {
                tracing::debug!(url = %self.url(), "MQTT broker already initialized");
            }
        }
    }

    fn is_initialized(&self) -> bool {
        self.session.is_initialized()
    }

    /// Mark the adapter offline and close the connection.
    ///
    /// A clean disconnect never fires the last will, so the `"0"` marker is
    /// published explicitly first. The monitor sends the disconnect once the
    /// marker's QoS 2 flow completed.
    fn shutdown(&self) {
        let Some(session) = self.session.get() else {
            return;
        };
        if self.closing.swap(true, Ordering::AcqRel) {
            return;
        }
        if !session.link.is_connected() {
            tracing::debug!(url = %self.url(), "stopping MQTT monitor before connection");
            session.monitor.abort();
            return;
        }

        session.link.request_close(1);
        if let Err(err) = session.outbox.try_publish(
            &topic::liveness_topic(&self.config.topic),
            PUBLISH_QOS,
            true,
            OFFLINE.as_bytes().to_vec(),
        ) {
            self.emitter
                .emit_error(MqttError::Client(err).into_device_error());
            session.link.request_close(0);
        }
    }
}
