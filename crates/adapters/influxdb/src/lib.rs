//! # smarthub-adapter-influxdb
//!
//! InfluxDB adapter: writes thing measurements as single-field points tagged
//! with the thing's name, location and description.
//!
//! `initialize` builds the client and then probes the server's health in the
//! background: a healthy server is reported as `Connect`, an unhealthy or
//! unreachable one as `Disconnect`. The adapter counts as initialized either
//! way, so writes go out even while the server is down. Each write runs in
//! its own task and reports failures as separate `Error` events.
//!
//! The HTTP side sits behind [`Connector`] / [`TimeSeriesClient`];
//! [`Influxdb2Connector`] is the production implementation.

mod client;
mod config;
mod error;

pub use client::{Connector, HostStatus, Influxdb2Client, Influxdb2Connector, TimeSeriesClient};
pub use config::InfluxConfig;
pub use error::InfluxError;

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;

use smarthub_app::emitter::DeviceEmitter;
use smarthub_app::lifecycle::{Initialize, Lifecycle};
use smarthub_app::ports::{Device, EventSink};
use smarthub_domain::device::DeviceSource;
use smarthub_domain::payload::Point;
use smarthub_domain::thing::Thing;

/// Type tag used for events and log lines.
pub const DEVICE_TYPE: &str = "InfluxDb";

const NOT_INITIALIZED: &str = "InfluxDB not initialized, unable to write measurement.";

struct Active<C> {
    client: Arc<C>,
    runtime: Handle,
}

/// Time-series database reached over HTTP.
pub struct InfluxDb<S, K: Connector = Influxdb2Connector> {
    config: InfluxConfig,
    emitter: DeviceEmitter<S>,
    connector: K,
    active: Lifecycle<Active<K::Client>>,
}

impl<S: EventSink + Clone + 'static> InfluxDb<S> {
    /// Create an uninitialized adapter using the `influxdb2` client.
    ///
    /// # Errors
    ///
    /// Returns [`InfluxError::Config`] when the configuration does not validate.
    pub fn new(config: InfluxConfig, sink: S) -> Result<Self, InfluxError> {
        Self::with_connector(config, sink, Influxdb2Connector)
    }
}

impl<S, K> InfluxDb<S, K>
where
    S: EventSink + Clone + 'static,
    K: Connector,
{
    /// Create an uninitialized adapter whose client comes from `connector`.
    ///
    /// # Errors
    ///
    /// Returns [`InfluxError::Config`] when the configuration does not validate.
    pub fn with_connector(
        config: InfluxConfig,
        sink: S,
        connector: K,
    ) -> Result<Self, InfluxError> {
        config.validate()?;
        let source = DeviceSource::new(DEVICE_TYPE, config.host.clone())?;
        Ok(Self {
            config,
            emitter: DeviceEmitter::new(source, sink),
            connector,
            active: Lifecycle::new(),
        })
    }

    /// Target reported by connect and disconnect events, e.g.
    /// `http://influx.local:8086/home`.
    #[must_use]
    pub fn probe_target(&self) -> String {
        format!(
            "http://{}:{}/{}",
            self.config.host, self.config.port, self.config.database
        )
    }

    /// Target reported by send events, e.g. `influx.local:8086`.
    #[must_use]
    pub fn send_target(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }

    /// Write `value` as `field` of `measurement`, tagged with `thing`.
    ///
    /// Emits `Send` right away; a failed write later emits `Error`. Emits
    /// only a `Warning` when the adapter is not initialized.
    pub fn send(&self, thing: &Thing, measurement: &str, field: &str, value: &str) {
        let Some(active) = self.active.get() else {
            self.emitter.emit_warning(NOT_INITIALIZED);
            return;
        };

        let point = Point::for_thing(thing, measurement, field, value);
        let client = Arc::clone(&active.client);
        let emitter = self.emitter.clone();
        let pending = point.clone();

        self.emitter.emit_send(self.send_target(), point);
        active.runtime.spawn(async move {
            if let Err(err) = client.write(pending).await {
                emitter.emit_error(err.into_device_error());
            }
        });
    }

    fn connect(&self) -> Result<Active<K::Client>, InfluxError> {
        let runtime = Handle::try_current().map_err(InfluxError::NoRuntime)?;
        let client = self.connector.connect(&self.config)?;
        Ok(Active {
            client: Arc::new(client),
            runtime,
        })
    }
}

impl<S, K> Device for InfluxDb<S, K>
where
    S: EventSink + Clone + 'static,
    K: Connector,
{
    fn source(&self) -> &DeviceSource {
        self.emitter.source()
    }

    fn initialize(&self) {
        match self.active.initialize(|| self.connect()) {
            Initialize::Ready(active) => {
                active.runtime.spawn(probe(
                    Arc::clone(&active.client),
                    self.emitter.clone(),
                    self.probe_target(),
                    Duration::from_millis(self.config.probe_timeout_ms),
                ));
            }
            Initialize::Failed(err) => self.emitter.emit_error(err.into_device_error()),
            Initialize::Skipped => {
                tracing::debug!(address = %self.config.host, "InfluxDB already initialized");
            }
        }
    }

    fn is_initialized(&self) -> bool {
        self.active.is_initialized()
    }

    fn shutdown(&self) {
        tracing::debug!(address = %self.config.host, "InfluxDB has no connection to close");
    }
}

/// Report the server as connected when any probed host is online.
async fn probe<C: TimeSeriesClient, S: EventSink>(
    client: Arc<C>,
    emitter: DeviceEmitter<S>,
    target: String,
    timeout: Duration,
) {
    match tokio::time::timeout(timeout, client.ping()).await {
        Ok(Ok(hosts)) if hosts.iter().any(|host| host.online) => {
            emitter.emit_connect(Some(&target), None);
        }
        Ok(Ok(_)) => emitter.emit_disconnect(Some(&target), None),
        Ok(Err(err)) => emitter.emit_error(err.into_device_error()),
        Err(_) => {
            tracing::debug!(%target, ?timeout, "InfluxDB health probe timed out");
            emitter.emit_disconnect(Some(&target), None);
        }
    }
}
