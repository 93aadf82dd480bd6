use crate::config::{ConnectionOptions, DEVELOPMENT_URI, PRODUCTION_URI};
use crate::error::{Error, Result};
use crate::headers::{HeaderValue, Headers};
use crate::notification::Message;
use crate::transport::{Endpoint, H2Transport, PushOptions, Stream, Transport};
use bytes::Bytes;
use http::Uri;
use http::uri::Scheme;
use std::path::Path;
use std::time::Duration;

const HTTPS_PORT: u16 = 443;

/// A validated connection to a push gateway.
///
/// Construction checks the gateway URI and the certificate path; nothing is
/// dialed until the first push. The configuration never changes afterwards, so
/// a single `Connection` can serve any number of concurrent pushes.
#[derive(Debug)]
pub struct Connection<T = H2Transport> {
    uri: Uri,
    cert_path: String,
    cert_pass: String,
    transport: T,
}

/// Resolves and checks the gateway URI, then the certificate path.
fn validate(options: &ConnectionOptions) -> Result<Uri> {
    let uri: Uri = options.uri.as_deref().unwrap_or(PRODUCTION_URI).parse()?;
    if uri.scheme() != Some(&Scheme::HTTPS) {
        return Err(Error::InsecureUri);
    }
    if uri.host().is_none() {
        return Err(Error::MissingHost(uri.to_string()));
    }

    if !Path::new(&options.cert_path).exists() {
        return Err(Error::CertNotFound(options.cert_path.clone()));
    }

    Ok(uri)
}

impl Connection<H2Transport> {
    /// Builds a connection that speaks HTTP/2 over TLS, presenting the client
    /// certificate found at `options.cert_path`.
    ///
    /// # Errors
    /// Returns `Error::InsecureUri` when the URI is not `https`, and
    /// `Error::CertNotFound` when the certificate file does not exist.
    pub fn new(options: ConnectionOptions) -> Result<Self> {
        let uri = validate(&options)?;
        let endpoint = Endpoint {
            host: uri.host().unwrap_or_default().to_string(),
            port: uri.port_u16().unwrap_or(HTTPS_PORT),
            cert_path: options.cert_path.clone(),
            cert_pass: options.cert_pass.clone(),
            connect_timeout: Duration::from_secs(options.connect_timeout_secs),
        };

        tracing::debug!(uri = %uri, cert_path = %options.cert_path, "Configured push gateway connection");

        Ok(Self { uri, cert_path: options.cert_path, cert_pass: options.cert_pass, transport: H2Transport::new(endpoint) })
    }

    /// Same as [`Connection::new`], pointed at the development gateway whatever
    /// `options.uri` says.
    pub fn development(options: ConnectionOptions) -> Result<Self> {
        Self::new(ConnectionOptions { uri: Some(DEVELOPMENT_URI.to_string()), ..options })
    }
}

impl<T: Transport> Connection<T> {
    /// Builds a connection that opens its streams through `transport`.
    ///
    /// # Errors
    /// Fails exactly like [`Connection::new`].
    pub fn with_transport(options: ConnectionOptions, transport: T) -> Result<Self> {
        let uri = validate(&options)?;
        Ok(Self { uri, cert_path: options.cert_path, cert_pass: options.cert_pass, transport })
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn scheme(&self) -> &str {
        self.uri.scheme_str().unwrap_or("https")
    }

    pub fn host(&self) -> &str {
        self.uri.host().unwrap_or_default()
    }

    pub fn port(&self) -> u16 {
        self.uri.port_u16().unwrap_or(HTTPS_PORT)
    }

    pub fn cert_path(&self) -> &str {
        &self.cert_path
    }

    pub fn cert_pass(&self) -> &str {
        &self.cert_pass
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Request headers for `notification`. Evaluates the body once to size it.
    pub fn build_headers_for<M: Message + ?Sized>(&self, notification: &M) -> Headers {
        let body = notification.body();
        self.headers_with_length(notification, body.len())
    }

    fn headers_with_length<M: Message + ?Sized>(&self, notification: &M, content_length: usize) -> Headers {
        let mut headers = Headers::new();
        headers.insert(":scheme", self.scheme());
        headers.insert(":method", "POST");
        headers.insert(":path", format!("/3/device/{}", notification.token()));
        headers.insert("host", self.host());
        headers.insert("content-length", content_length.to_string());

        if let Some(id) = notification.id() {
            headers.insert("apns-id", id);
        }
        if let Some(expiration) = notification.expiration() {
            headers.insert("apns-expiration", HeaderValue::Integer(expiration));
        }
        if let Some(priority) = notification.priority() {
            headers.insert("apns-priority", HeaderValue::Integer(priority));
        }
        if let Some(topic) = notification.topic() {
            headers.insert("apns-topic", topic);
        }
        if let Some(collapse_id) = notification.collapse_id() {
            headers.insert("apns-collapse-id", collapse_id);
        }
        if let Some(push_type) = notification.push_type() {
            headers.insert("apns-push-type", push_type);
        }

        headers
    }

    /// Sends `notification` on a new stream and hands back the stream's pending
    /// response. Transport errors come back exactly as the transport raised them.
    pub async fn push<M: Message + ?Sized>(
        &self,
        notification: &M,
        options: PushOptions,
    ) -> std::result::Result<<T::Stream as Stream>::Response, T::Error> {
        let body = Bytes::from(notification.body());
        let headers = self.headers_with_length(notification, body.len());

        let mut stream = self.transport.new_stream().await?;
        stream.headers(headers, false).await?;
        stream.data(body, true).await?;
        tracing::debug!(token = %notification.token(), "Dispatched notification");

        Ok(stream.response(options))
    }

    pub async fn close(&self) {
        self.transport.close().await;
    }
}
