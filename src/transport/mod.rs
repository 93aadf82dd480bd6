use crate::headers::Headers;
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use thiserror::Error;

pub mod http2;
pub mod tls;

pub use self::http2::{Endpoint, H2Stream, H2Transport, PendingResponse};

const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);

/// Options forwarded untouched from [`Connection::push`](crate::Connection::push)
/// to [`Stream::response`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PushOptions {
    /// How long to wait for the gateway's reply. `None` waits forever.
    pub timeout: Option<Duration>,
}

impl Default for PushOptions {
    fn default() -> Self {
        Self { timeout: Some(DEFAULT_RESPONSE_TIMEOUT) }
    }
}

/// Opens request streams on a multiplexed connection to the gateway.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    type Stream: Stream<Error = Self::Error>;
    type Error: Send + 'static;

    /// Acquires a fresh stream. Every push gets its own.
    async fn new_stream(&self) -> Result<Self::Stream, Self::Error>;

    /// Tears the connection down. Streams already open may finish.
    async fn close(&self) {}
}

/// A single request/response exchange.
#[async_trait]
pub trait Stream: Send {
    type Error: Send + 'static;
    type Response;

    async fn headers(&mut self, headers: Headers, end_stream: bool) -> Result<(), Self::Error>;

    async fn data(&mut self, data: Bytes, end_stream: bool) -> Result<(), Self::Error>;

    /// Hands out the pending reply for this stream.
    fn response(self, options: PushOptions) -> Self::Response;
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP/2 error: {0}")]
    H2(#[from] ::h2::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),
    #[error("Invalid server name: {0}")]
    ServerName(#[from] rustls::pki_types::InvalidDnsNameError),
    #[error("Invalid client certificate {path}: {reason}")]
    Identity { path: String, reason: String },
    #[error("Invalid request: {0}")]
    Request(#[from] http::Error),
    #[error("Missing pseudo-header {0}")]
    MissingPseudoHeader(&'static str),
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
    #[error("Stream has not been opened")]
    StreamNotOpened,
    #[error("Stream was closed by the gateway")]
    StreamClosed,
    #[error("Connection is closed")]
    Closed,
}
