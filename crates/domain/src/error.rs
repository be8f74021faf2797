//! Common error types used across the workspace.
//!
//! Two families live here:
//! - [`ValidationError`] for invariants checked by builders and configs.
//! - [`DeviceError`] for failures that adapters surface as error events.
//!
//! Adapter crates define their own typed errors and convert into
//! [`DeviceError`] before emitting.

use std::error::Error as StdError;

/// Boxed error used as the source of a [`DeviceError`].
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// A domain invariant was violated.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A device or thing was created without an address.
    #[error("address must not be empty")]
    EmptyAddress,

    /// A name-like field was empty.
    #[error("{0} must not be empty")]
    Empty(&'static str),

    /// A port field was zero.
    #[error("{0} must be a non-zero port")]
    InvalidPort(&'static str),

    /// Any other rule, described in plain text.
    #[error("{0}")]
    Invalid(String),
}

/// Category of a [`DeviceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Building the transport handle failed; the adapter stays uninitialized.
    Setup,
    /// The transport reported a failure after setup.
    Transport,
}

/// Failure carried by an error event.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// The transport handle could not be constructed.
    #[error("transport setup failed")]
    Setup(#[source] BoxError),

    /// The transport reported an asynchronous failure.
    #[error("transport error")]
    Transport(#[source] BoxError),
}

impl DeviceError {
    /// Wrap any error as a setup failure.
    pub fn setup(err: impl Into<BoxError>) -> Self {
        Self::Setup(err.into())
    }

    /// Wrap any error as a transport failure.
    pub fn transport(err: impl Into<BoxError>) -> Self {
        Self::Transport(err.into())
    }

    /// Which lifecycle phase produced the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Setup(_) => ErrorKind::Setup,
            Self::Transport(_) => ErrorKind::Transport,
        }
    }

    /// Render the error and its whole source chain, joined by `": "`.
    #[must_use]
    pub fn chain_message(&self) -> String {
        let mut message = self.to_string();
        let mut source = StdError::source(self);
        while let Some(err) = source {
            message.push_str(": ");
            message.push_str(&err.to_string());
            source = err.source();
        }
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_display_empty_address() {
        assert_eq!(
            ValidationError::EmptyAddress.to_string(),
            "address must not be empty"
        );
    }

    #[test]
    fn should_display_invalid_port_with_field_name() {
        let err = ValidationError::InvalidPort("virtual_output_port");
        assert_eq!(
            err.to_string(),
            "virtual_output_port must be a non-zero port"
        );
    }

    #[test]
    fn should_classify_setup_and_transport_errors() {
        let io = std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use");
        assert_eq!(DeviceError::setup(io).kind(), ErrorKind::Setup);

        let io = std::io::Error::other("boom");
        assert_eq!(DeviceError::transport(io).kind(), ErrorKind::Transport);
    }

    #[test]
    fn should_keep_source_out_of_display() {
        let io = std::io::Error::other("socket closed");
        let err = DeviceError::transport(io);
        assert_eq!(err.to_string(), "transport error");
        let source = StdError::source(&err).unwrap();
        assert_eq!(source.to_string(), "socket closed");
    }

    #[test]
    fn should_render_full_chain_message() {
        #[derive(Debug, thiserror::Error)]
        #[error("failed to bind UDP socket on port 4001")]
        struct Bind(#[source] std::io::Error);

        let io = std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use");
        let err = DeviceError::setup(Bind(io));
        assert_eq!(
            err.chain_message(),
            "transport setup failed: failed to bind UDP socket on port 4001: address in use"
        );
    }
}
