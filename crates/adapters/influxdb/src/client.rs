//! Time-series client port and its `influxdb2` implementation.

use std::future::Future;

use influxdb2::models::DataPoint;
use influxdb2::models::data_point::DataPointError;
use influxdb2::models::health::Status;
use influxdb2::{Client, RequestError};

use smarthub_domain::payload::Point;

use crate::config::InfluxConfig;
use crate::error::InfluxError;

/// Reachability of one server as seen by a health check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostStatus {
    pub url: String,
    pub online: bool,
}

/// Operations the adapter needs from a time-series server.
pub trait TimeSeriesClient: Send + Sync + 'static {
    /// Probe every configured host.
    ///
    /// Unreachable hosts and hosts answering with an HTTP error status are
    /// reported offline. An error means a host answered with a body that is
    /// not a health report.
    fn ping(&self) -> impl Future<Output = Result<Vec<HostStatus>, InfluxError>> + Send;

    /// Write one point to the configured database.
    fn write(&self, point: Point) -> impl Future<Output = Result<(), InfluxError>> + Send;
}

/// Builds the client used by an adapter during `initialize`.
pub trait Connector: Send + Sync + 'static {
    type Client: TimeSeriesClient;

    /// Build a client for `config`.
    ///
    /// # Errors
    ///
    /// Returns [`InfluxError`] when no client can be built for `config`.
    fn connect(&self, config: &InfluxConfig) -> Result<Self::Client, InfluxError>;
}

/// Default connector backed by the `influxdb2` HTTP client.
#[derive(Debug, Clone, Copy, Default)]
pub struct Influxdb2Connector;

impl Connector for Influxdb2Connector {
    type Client = Influxdb2Client;

    fn connect(&self, config: &InfluxConfig) -> Result<Self::Client, InfluxError> {
        let url = format!("http://{}:{}", config.host, config.port);
        Ok(Influxdb2Client {
            client: Client::new(url.clone(), config.org.clone(), config.token.clone()),
            bucket: config.database.clone(),
            url,
        })
    }
}

/// A single InfluxDB server, written to through one bucket.
#[derive(Clone)]
pub struct Influxdb2Client {
    client: Client,
    bucket: String,
    url: String,
}

impl TimeSeriesClient for Influxdb2Client {
    async fn ping(&self) -> Result<Vec<HostStatus>, InfluxError> {
        let online = match self.client.health().await {
            Ok(check) => matches!(check.status, Status::Pass),
            Err(RequestError::Http { status, text }) => {
                tracing::debug!(url = %self.url, %status, %text, "InfluxDB health check refused");
                false
            }
            Err(RequestError::ReqwestProcessing { source }) if !source.is_decode() => {
                tracing::debug!(url = %self.url, %source, "InfluxDB host unreachable");
                false
            }
            Err(err) => return Err(InfluxError::Request(err)),
        };
        Ok(vec![HostStatus {
            url: self.url.clone(),
            online,
        }])
    }

    async fn write(&self, point: Point) -> Result<(), InfluxError> {
        let data_point = to_data_point(&point).map_err(InfluxError::Point)?;
        self.client
            .write(&self.bucket, futures::stream::iter(vec![data_point]))
            .await
            .map_err(InfluxError::Request)
    }
}

/// Encode `point` for the write API.
///
/// Line protocol has no empty tag values, so empty tags are left out.
fn to_data_point(point: &Point) -> Result<DataPoint, DataPointError> {
    let mut builder = DataPoint::builder(point.measurement.as_str());
    for (key, value) in point.tags.iter().filter(|(_, value)| !value.is_empty()) {
        builder = builder.tag(key.as_str(), value.as_str());
    }
    for (key, value) in &point.fields {
        builder = builder.field(key.as_str(), value.clone());
    }
    builder.build()
}
