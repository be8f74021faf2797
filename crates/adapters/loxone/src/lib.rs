//! # smarthub-adapter-loxone
//!
//! Loxone Miniserver adapter: exchanges line-protocol messages with the
//! Miniserver's virtual UDP inputs and outputs.
//!
//! ## How it works
//!
//! The adapter binds `0.0.0.0:<virtual_output_port>` and parses every
//! datagram the Miniserver sends there into a
//! [`DeviceMessage`](smarthub_domain::message::DeviceMessage), reported as a
//! `Receive` event. [`LoxoneMiniserver::send`] writes one datagram to
//! `<host>:<virtual_input_port>`.
//!
//! See [`protocol`] for the line grammar.
//!
//! ## Dependency rule
//!
//! Same as other adapters: depends on `smarthub-app` and `smarthub-domain`.

mod config;
mod error;
pub mod protocol;

pub use config::{LoxoneConfig, MalformedPolicy};
pub use error::{LoxoneError, MalformedDatagram};

use std::future::Future;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;

use smarthub_app::emitter::DeviceEmitter;
use smarthub_app::lifecycle::{Initialize, Lifecycle};
use smarthub_app::ports::{Device, EventSink};
use smarthub_domain::device::DeviceSource;
use smarthub_domain::message::DeviceMessage;
use smarthub_domain::thing::Thing;

/// Type tag used for events and log lines.
pub const DEVICE_TYPE: &str = "LoxoneMiniserver";

const NOT_INITIALIZED: &str = "Loxone Miniserver not initialized, unable to send message.";

/// Largest payload a UDP datagram can carry.
const MAX_DATAGRAM: usize = 65_535;

/// Pause after a failed receive before reading the socket again.
const RECEIVE_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Bound socket plus the runtime that drives it.
struct Endpoint {
    socket: Arc<UdpSocket>,
    runtime: Handle,
}

/// Loxone Miniserver reached over virtual UDP inputs and outputs.
pub struct LoxoneMiniserver<S> {
    config: LoxoneConfig,
    emitter: DeviceEmitter<S>,
    endpoint: Lifecycle<Endpoint>,
    receiver: OnceLock<AbortHandle>,
    closed: AtomicBool,
}

impl<S: EventSink + Clone + 'static> LoxoneMiniserver<S> {
    /// Create an uninitialized adapter publishing its events into `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`LoxoneError::Config`] when the configuration does not
    /// validate.
    pub fn new(config: LoxoneConfig, sink: S) -> Result<Self, LoxoneError> {
        config.validate()?;
        let source = DeviceSource::new(DEVICE_TYPE, config.host.clone())?;
        Ok(Self {
            config,
            emitter: DeviceEmitter::new(source, sink),
            endpoint: Lifecycle::new(),
            receiver: OnceLock::new(),
            closed: AtomicBool::new(false),
        })
    }

    /// Where outbound datagrams go, e.g. `10.0.0.5:4000`.
    #[must_use]
    pub fn send_target(&self) -> String {
        format!("{}:{}", self.config.host, self.config.virtual_input_port)
    }

    /// Where inbound datagrams are received, e.g. `udp://0.0.0.0:4001`.
    #[must_use]
    pub fn bind_target(&self) -> String {
        format!("udp://0.0.0.0:{}", self.config.virtual_output_port)
    }

    /// Address the socket is bound to, once initialized.
    ///
    /// Useful when `virtual_output_port` is `0` and the OS picks the port.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.endpoint
            .get()
            .and_then(|endpoint| endpoint.socket.local_addr().ok())
    }

    /// Send `value` for `property` of `thing` to the virtual input.
    ///
    /// The datagram is `thing=<thing.name> property=<property> value=<value>`.
    /// The host is resolved on every send and the first IPv4 address is used,
    /// since the socket is bound to `0.0.0.0`.
    /// Emits `Send` once the socket accepted it, `Error` otherwise, and a
    /// `Warning` without sending anything when the adapter is not initialized.
    pub fn send(&self, thing: &Thing, property: &str, value: &str) {
        let Some(endpoint) = self.endpoint.get() else {
            self.emitter.emit_warning(NOT_INITIALIZED);
            return;
        };

        let message = DeviceMessage::new(thing.name.clone(), property, value);
        let datagram = protocol::format_line(&message).into_bytes();
        let socket = Arc::clone(&endpoint.socket);
        let emitter = self.emitter.clone();
        let host = self.config.host.clone();
        let port = self.config.virtual_input_port;
        let target = self.send_target();

        endpoint.runtime.spawn(async move {
            let addr = match resolve_ipv4(&host, port).await {
                Ok(addr) => addr,
                Err(source) => {
                    emitter.emit_error(LoxoneError::Resolve { target, source }.into_device_error());
                    return;
                }
            };
            match socket.send_to(&datagram, addr).await {
                Ok(_) => emitter.emit_send(target, message),
                Err(source) => {
                    emitter.emit_error(LoxoneError::Send { target, source }.into_device_error());
                }
            }
        });
    }

    fn bind(&self) -> Result<Endpoint, LoxoneError> {
        let runtime = Handle::try_current().map_err(LoxoneError::NoRuntime)?;
        let port = self.config.virtual_output_port;
        let bind_err = |source| LoxoneError::Bind { port, source };

        let socket = std::net::UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port)).map_err(bind_err)?;
        socket.set_nonblocking(true).map_err(bind_err)?;
        let socket = UdpSocket::from_std(socket).map_err(bind_err)?;

        Ok(Endpoint {
            socket: Arc::new(socket),
            runtime,
        })
    }
}

impl<S: EventSink + Clone + 'static> Device for LoxoneMiniserver<S> {
    fn source(&self) -> &DeviceSource {
        self.emitter.source()
    }

    fn initialize(&self) {
        match self.endpoint.initialize(|| self.bind()) {
            Initialize::Ready(endpoint) => {
                self.emitter
                    .emit_connect(Some(&self.send_target()), Some(&self.bind_target()));

                let task = endpoint.runtime.spawn(receive_loop(
                    Arc::clone(&endpoint.socket),
                    self.emitter.clone(),
                    self.config.on_malformed,
                ));
                let _ = self.receiver.set(task.abort_handle());
            }
            Initialize::Failed(err) => self.emitter.emit_error(err.into_device_error()),
            Initialize::Skipped => {
                tracing::debug!(address = %self.config.host, "Loxone Miniserver already initialized");
            }
        }
    }

    fn is_initialized(&self) -> bool {
        self.endpoint.is_initialized()
    }

    fn shutdown(&self) {
        let Some(receiver) = self.receiver.get() else {
            return;
        };
        if receiver.is_finished() || self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        receiver.abort();
        self.emitter
            .emit_disconnect(Some(&self.send_target()), Some(&self.bind_target()));
    }
}

/// First IPv4 address of `host`.
async fn resolve_ipv4(host: &str, port: u16) -> io::Result<SocketAddr> {
    tokio::net::lookup_host((host, port))
        .await?
        .find(SocketAddr::is_ipv4)
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("{host} has no IPv4 address"),
            )
        })
}

/// Where the receive loop reads datagrams from.
trait Inbound: Send + Sync + 'static {
    fn recv_from(
        &self,
        buf: &mut [u8],
    ) -> impl Future<Output = io::Result<(usize, SocketAddr)>> + Send;
}

impl Inbound for UdpSocket {
    fn recv_from(
        &self,
        buf: &mut [u8],
    ) -> impl Future<Output = io::Result<(usize, SocketAddr)>> + Send {
        UdpSocket::recv_from(self, buf)
    }
}

/// Receive datagrams until the task is aborted.
///
/// A failed receive is reported as an error and the socket stays bound.
async fn receive_loop<R: Inbound, S: EventSink>(
    socket: Arc<R>,
    emitter: DeviceEmitter<S>,
    policy: MalformedPolicy,
) {
    let mut buf = vec![0u8; MAX_DATAGRAM];
    loop {
        match socket.recv_from(&mut buf).await {
            Ok((len, peer)) => handle_datagram(&emitter, policy, &buf[..len], peer),
            Err(err) => {
                emitter.emit_error(LoxoneError::Receive(err).into_device_error());
                tokio::time::sleep(RECEIVE_RETRY_DELAY).await;
            }
        }
    }
}

fn handle_datagram<S: EventSink>(
    emitter: &DeviceEmitter<S>,
    policy: MalformedPolicy,
    datagram: &[u8],
    peer: SocketAddr,
) {
    match protocol::parse_datagram(datagram) {
        Ok(message) => emitter.emit_receive(peer.ip().to_string(), message),
        Err(err) => match policy {
            MalformedPolicy::Drop => {
                tracing::trace!(%peer, %err, "dropping malformed datagram");
            }
            MalformedPolicy::Warn => {
                emitter.emit_warning(format!("dropping datagram from {peer}: {err}"));
            }
        },
    }
}
