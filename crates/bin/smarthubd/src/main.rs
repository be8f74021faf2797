//! # smarthubd: smarthub daemon
//!
//! Composition root that wires the device adapters together.
//!
//! ## Responsibilities
//! - Load configuration (`smarthub.toml`, env vars)
//! - Install the `tracing` subscriber
//! - Create the in-process event bus
//! - Construct the configured adapters and initialize them
//! - Forward Miniserver readings to the broker and the database
//! - Shut the adapters down on SIGINT
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer, and no domain logic belongs here.

mod bridge;
mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use smarthub_adapter_influxdb::InfluxDb;
use smarthub_adapter_loxone::LoxoneMiniserver;
use smarthub_adapter_mqtt::MqttBroker;
use smarthub_app::event_bus::InProcessEventBus;
use smarthub_app::ports::Device;

use crate::bridge::Bridge;
use crate::config::Config;

/// Time left to shutdown messages before the runtime stops. Covers the MQTT
/// adapter's wait for the offline marker's QoS 2 flow.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(1500);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let Config {
        logging,
        events,
        bridge,
        loxone,
        mqtt,
        influxdb,
    } = Config::load().context("failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&logging.filter).context("invalid logging filter")?)
        .init();

    // Event bus
    let event_bus = InProcessEventBus::new(events.capacity);

    // Adapters
    let loxone = loxone
        .map(|config| LoxoneMiniserver::new(config, event_bus.clone()))
        .transpose()
        .context("failed to build Loxone adapter")?
        .map(Arc::new);
    let mqtt = mqtt
        .map(|config| MqttBroker::new(config, event_bus.clone()))
        .transpose()
        .context("failed to build MQTT adapter")?
        .map(Arc::new);
    let influxdb = influxdb
        .map(|config| InfluxDb::new(config, event_bus.clone()))
        .transpose()
        .context("failed to build InfluxDB adapter")?
        .map(Arc::new);

    let mut devices: Vec<Arc<dyn Device>> = Vec::new();
    if let Some(adapter) = &loxone {
        devices.push(adapter.clone());
    }
    if let Some(adapter) = &mqtt {
        devices.push(adapter.clone());
    }
    if let Some(adapter) = &influxdb {
        devices.push(adapter.clone());
    }
    if devices.is_empty() {
        tracing::warn!("no adapter configured, add [loxone], [mqtt] or [influxdb] to smarthub.toml");
    }

    // Bridge
    let bridge = Bridge::new(bridge, mqtt, influxdb);
    if loxone.is_some() && bridge.is_active() {
        tokio::spawn(bridge.run(event_bus.subscribe()));
    }

    for device in &devices {
        device.initialize();
    }
    tracing::info!(adapters = devices.len(), "smarthubd started");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    tracing::info!("shutting down");
    for device in &devices {
        device.shutdown();
    }
    tokio::time::sleep(SHUTDOWN_GRACE).await;

    Ok(())
}
