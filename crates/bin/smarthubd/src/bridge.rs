//! Forwards readings received from the Miniserver to the MQTT broker and
//! to InfluxDB.
//!
//! A reading `thing=<t> property=<p> value=<v>` from `<peer>` becomes the
//! thing `<t>` at `<peer>`. It is published under `<prefix>/<p>/<t>` and
//! written as field `<p>` of the configured measurement.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use smarthub_adapter_influxdb::InfluxDb;
use smarthub_adapter_mqtt::MqttBroker;
use smarthub_app::ports::EventSink;
use smarthub_domain::event::DeviceEvent;
use smarthub_domain::payload::Payload;
use smarthub_domain::thing::Thing;

use crate::config::BridgeConfig;

pub struct Bridge<S> {
    config: BridgeConfig,
    mqtt: Option<Arc<MqttBroker<S>>>,
    influxdb: Option<Arc<InfluxDb<S>>>,
}

impl<S: EventSink + Clone + 'static> Bridge<S> {
    pub fn new(
        config: BridgeConfig,
        mqtt: Option<Arc<MqttBroker<S>>>,
        influxdb: Option<Arc<InfluxDb<S>>>,
    ) -> Self {
        Self {
            config,
            mqtt,
            influxdb,
        }
    }

    /// Whether forwarding is enabled and has somewhere to go.
    pub fn is_active(&self) -> bool {
        self.config.enabled && (self.mqtt.is_some() || self.influxdb.is_some())
    }

    /// Forward `event` if it is a Miniserver reading.
    pub fn forward(&self, event: &DeviceEvent) -> bool {
        let DeviceEvent::Receive {
            source,
            receive_from,
            message: Payload::Message(reading),
        } = event
        else {
            return false;
        };
        if source.device_type() != smarthub_adapter_loxone::DEVICE_TYPE {
            return false;
        }

        let thing = match Thing::builder(receive_from.as_str())
            .name(reading.thing.as_str())
            .build()
        {
            Ok(thing) => thing,
            Err(err) => {
                tracing::warn!(%receive_from, %err, "cannot forward reading");
                return false;
            }
        };

        if let Some(mqtt) = &self.mqtt {
            mqtt.send(&thing, &reading.property, &reading.value, self.config.retain);
        }
        if let Some(influxdb) = &self.influxdb {
            influxdb.send(
                &thing,
                &self.config.measurement,
                &reading.property,
                &reading.value,
            );
        }
        true
    }

    pub async fn run(self, mut events: broadcast::Receiver<DeviceEvent>) {
        loop {
            match events.recv().await {
                Ok(event) => {
                    self.forward(&event);
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "bridge fell behind the event bus");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
}
