use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use http_body_util::combinators::UnsyncBoxBody;
use hyper::{Request, Response};
use thiserror::Error;

/// Boxed error used for request and response bodies crossing the transport
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Body type for both directions of a proxied exchange
pub type ProxyBody = UnsyncBoxBody<Bytes, BoxError>;

/// Error type for backend dispatch
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TransportError {
    /// The TCP connection to the backend could not be opened
    #[error("Connection to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The TLS handshake with the backend failed
    #[error("TLS handshake with {host} failed: {source}")]
    Handshake {
        host: String,
        #[source]
        source: std::io::Error,
    },

    /// The backend presented a certificate that does not prove the expected identity
    #[error("Backend certificate rejected for {host}: {reason}")]
    Untrusted { host: String, reason: String },

    /// The backend address could not be turned into a dialable host/identity
    #[error("Invalid backend address: {0}")]
    InvalidAddress(String),

    /// The TLS client configuration could not be built
    #[error("TLS configuration error: {0}")]
    Config(String),

    /// The request failed after a connection was available
    #[error("Backend request failed: {0}")]
    Request(#[source] BoxError),
}

/// Result type alias for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Type alias for async round-trip responses
pub type TransportFuture<'a> =
    Pin<Box<dyn Future<Output = TransportResult<Response<ProxyBody>>> + Send + 'a>>;

/// Transport defines the port (interface) for sending a rewritten request to a backend
pub trait Transport: Send + Sync + 'static {
    /// Send an outbound request and resolve to the backend's response head.
    ///
    /// The response body is streamed, never collected by the transport.
    fn round_trip<'a>(&'a self, req: Request<ProxyBody>) -> TransportFuture<'a>;
}
