use super::tls::{self, ClientIdentity};
use super::{PushOptions, Stream, Transport, TransportError};
use crate::headers::Headers;
use crate::response::Response;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::FutureExt;
use futures::future::BoxFuture;
use h2::client::{ResponseFuture, SendRequest};
use h2::{RecvStream, SendStream};
use http::{Method, Request, Uri};
use opentelemetry::{global, metrics::Counter};
use std::fmt;
use std::future::{Future, poll_fn};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_rustls::TlsConnector;
use tracing::Instrument;

const CLOSE_GRACE_PERIOD: Duration = Duration::from_secs(5);

#[derive(Clone, Debug)]
struct Metrics {
    connections: Counter<u64>,
    streams: Counter<u64>,
    errors: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("apns-h2");
        Self {
            connections: meter
                .u64_counter("apns_connections_total")
                .with_description("Total number of HTTP/2 connections opened to the gateway")
                .build(),
            streams: meter
                .u64_counter("apns_streams_total")
                .with_description("Total number of request streams opened")
                .build(),
            errors: meter
                .u64_counter("apns_stream_errors_total")
                .with_description("Total number of streams that failed before a response arrived")
                .build(),
        }
    }
}

/// Where and how to dial the gateway.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub cert_path: String,
    pub cert_pass: String,
    pub connect_timeout: Duration,
}

#[derive(Debug)]
struct Client {
    send_request: SendRequest<Bytes>,
    task: JoinHandle<()>,
}

impl Client {
    async fn handshake<IO>(io: IO) -> Result<Self, TransportError>
    where
        IO: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (send_request, connection) = h2::client::handshake(io).await?;
        let task = tokio::spawn(
            async move {
                if let Err(e) = connection.await {
                    tracing::warn!(error = %e, "HTTP/2 connection terminated");
                } else {
                    tracing::debug!("HTTP/2 connection closed");
                }
            }
            .instrument(tracing::info_span!("apns_connection")),
        );

        Ok(Self { send_request, task })
    }

    fn is_open(&self) -> bool {
        !self.task.is_finished()
    }
}

/// HTTP/2 transport to the gateway.
///
/// One TLS connection is dialed on the first stream request and shared by all
/// streams afterwards. If the gateway drops it, the next stream request dials
/// again. Once closed, the transport refuses new streams for good.
#[derive(Debug)]
pub struct H2Transport {
    endpoint: Option<Endpoint>,
    client: Mutex<Option<Client>>,
    closed: AtomicBool,
    metrics: Metrics,
}

impl H2Transport {
    /// A transport that dials `endpoint` lazily.
    pub fn new(endpoint: Endpoint) -> Self {
        Self { endpoint: Some(endpoint), client: Mutex::new(None), closed: AtomicBool::new(false), metrics: Metrics::new() }
    }

    /// Runs the HTTP/2 handshake over an already established socket. The
    /// resulting transport does not redial once that socket closes.
    pub async fn handshake<IO>(io: IO) -> Result<Self, TransportError>
    where
        IO: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let metrics = Metrics::new();
        let client = Client::handshake(io).await?;
        metrics.connections.add(1, &[]);
        Ok(Self { endpoint: None, client: Mutex::new(Some(client)), closed: AtomicBool::new(false), metrics })
    }

    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.endpoint.as_ref()
    }

    async fn dial(&self, endpoint: &Endpoint) -> Result<Client, TransportError> {
        let identity = ClientIdentity::load(&endpoint.cert_path, &endpoint.cert_pass)?;
        let connector = TlsConnector::from(Arc::new(tls::client_config(identity)?));
        let server_name = rustls::pki_types::ServerName::try_from(endpoint.host.clone())?;

        let connect = async {
            let tcp = TcpStream::connect((endpoint.host.as_str(), endpoint.port)).await?;
            tcp.set_nodelay(true)?;
            connector.connect(server_name, tcp).await
        };
        let tls = tokio::time::timeout(endpoint.connect_timeout, connect)
            .await
            .map_err(|_| TransportError::Timeout(endpoint.connect_timeout))??;

        let client = Client::handshake(tls).await?;
        self.metrics.connections.add(1, &[]);
        tracing::info!(host = %endpoint.host, port = endpoint.port, "Connected to push gateway");

        Ok(client)
    }

    async fn send_request(&self) -> Result<SendRequest<Bytes>, TransportError> {
        let mut client = self.client.lock().await;
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        if let Some(open) = client.as_ref().filter(|c| c.is_open()) {
            return Ok(open.send_request.clone());
        }

        let endpoint = self.endpoint.as_ref().ok_or(TransportError::Closed)?;
        let fresh = self.dial(endpoint).await?;
        let send_request = fresh.send_request.clone();
        *client = Some(fresh);

        Ok(send_request)
    }
}

#[async_trait]
impl Transport for H2Transport {
    type Stream = H2Stream;
    type Error = TransportError;

    async fn new_stream(&self) -> Result<H2Stream, TransportError> {
        let send_request = self.send_request().await?.ready().await?;
        self.metrics.streams.add(1, &[]);
        Ok(H2Stream { send_request, response: None, body: None, metrics: self.metrics.clone() })
    }

    async fn close(&self) {
        let taken = {
            let mut client = self.client.lock().await;
            self.closed.store(true, Ordering::Release);
            client.take()
        };
        let Some(client) = taken else {
            return;
        };
        let Client { send_request, mut task } = client;
        // The connection task winds down once every handle to it is gone.
        drop(send_request);
        if tokio::time::timeout(CLOSE_GRACE_PERIOD, &mut task).await.is_err() {
            tracing::warn!("HTTP/2 connection did not close in time, aborting");
            task.abort();
        }
    }
}

/// One request stream on an [`H2Transport`].
pub struct H2Stream {
    send_request: SendRequest<Bytes>,
    response: Option<ResponseFuture>,
    body: Option<SendStream<Bytes>>,
    metrics: Metrics,
}

impl fmt::Debug for H2Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("H2Stream")
            .field("opened", &self.response.is_some())
            .field("streaming", &self.body.is_some())
            .finish_non_exhaustive()
    }
}

/// Turns built headers into an `http::Request`. The `host` header travels as
/// the `:authority` pseudo-header.
fn build_request(headers: &Headers) -> Result<Request<()>, TransportError> {
    let pseudo = |name: &'static str| {
        headers.get(name).map(ToString::to_string).ok_or(TransportError::MissingPseudoHeader(name))
    };
    let scheme = pseudo(":scheme")?;
    let method = pseudo(":method")?;
    let path = pseudo(":path")?;
    let authority = headers.get("host").map(ToString::to_string).ok_or(TransportError::MissingPseudoHeader("host"))?;

    let uri = Uri::builder().scheme(scheme.as_str()).authority(authority.as_str()).path_and_query(path.as_str()).build()?;
    let mut request = Request::builder().method(Method::from_bytes(method.as_bytes()).map_err(http::Error::from)?).uri(uri);
    for (name, value) in headers.regular().filter(|(name, _)| *name != "host") {
        request = request.header(name, value.to_string());
    }

    Ok(request.body(())?)
}

async fn write_body(body: &mut SendStream<Bytes>, mut data: Bytes, end_stream: bool) -> Result<(), TransportError> {
    if data.is_empty() {
        body.send_data(data, end_stream)?;
        return Ok(());
    }

    while !data.is_empty() {
        body.reserve_capacity(data.len());
        let capacity = poll_fn(|cx| body.poll_capacity(cx)).await.ok_or(TransportError::StreamClosed)??;
        if capacity == 0 {
            continue;
        }
        let chunk = data.split_to(capacity.min(data.len()));
        body.send_data(chunk, end_stream && data.is_empty())?;
    }

    Ok(())
}

async fn read_response(response: ResponseFuture) -> Result<Response, TransportError> {
    let (parts, mut recv) = response.await?.into_parts();
    let body = read_body(&mut recv).await?;
    tracing::debug!(status = %parts.status, "Received gateway response");

    Ok(Response { status: parts.status, headers: parts.headers, body })
}

async fn read_body(recv: &mut RecvStream) -> Result<Bytes, TransportError> {
    let mut body = BytesMut::new();
    while let Some(chunk) = recv.data().await {
        let chunk = chunk?;
        body.extend_from_slice(&chunk);
        recv.flow_control().release_capacity(chunk.len())?;
    }
    Ok(body.freeze())
}

#[async_trait]
impl Stream for H2Stream {
    type Error = TransportError;
    type Response = PendingResponse;

    async fn headers(&mut self, headers: Headers, end_stream: bool) -> Result<(), TransportError> {
        let request = build_request(&headers)?;
        let (response, body) = self.send_request.send_request(request, end_stream)?;
        tracing::debug!(path = ?headers.get(":path").map(ToString::to_string), end_stream, "Sent request headers");

        self.response = Some(response);
        self.body = (!end_stream).then_some(body);
        Ok(())
    }

    async fn data(&mut self, data: Bytes, end_stream: bool) -> Result<(), TransportError> {
        let body = self.body.as_mut().ok_or(TransportError::StreamNotOpened)?;
        write_body(body, data, end_stream).await?;
        if end_stream {
            self.body = None;
        }
        Ok(())
    }

    fn response(self, options: PushOptions) -> PendingResponse {
        let Some(response) = self.response else {
            return PendingResponse::failed(TransportError::StreamNotOpened);
        };
        let errors = self.metrics.errors;

        let exchange = read_response(response);
        let inner = async move {
            let result = match options.timeout {
                Some(timeout) => tokio::time::timeout(timeout, exchange)
                    .await
                    .unwrap_or_else(|_| Err(TransportError::Timeout(timeout))),
                None => exchange.await,
            };
            if let Err(e) = &result {
                errors.add(1, &[]);
                tracing::warn!(error = %e, "Push did not receive a response");
            }
            result
        };

        PendingResponse { inner: inner.boxed() }
    }
}

/// The eventual reply to a push, resolved once the gateway answers.
pub struct PendingResponse {
    inner: BoxFuture<'static, Result<Response, TransportError>>,
}

impl PendingResponse {
    fn failed(error: TransportError) -> Self {
        Self { inner: futures::future::ready(Err(error)).boxed() }
    }
}

impl fmt::Debug for PendingResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingResponse").finish_non_exhaustive()
    }
}

impl Future for PendingResponse {
    type Output = Result<Response, TransportError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.poll_unpin(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers() -> Headers {
        [
            (":scheme", "https"),
            (":method", "POST"),
            (":path", "/3/device/phone-token"),
            ("host", "api.push.apple.com"),
            ("content-length", "17"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_build_request() {
        let mut headers = headers();
        headers.insert("apns-priority", 10u64);
        headers.insert("apns-topic", "com.example.myapp");

        let request = build_request(&headers).unwrap();

        assert_eq!(request.method(), &Method::POST);
        assert_eq!(request.uri().to_string(), "https://api.push.apple.com/3/device/phone-token");
        assert_eq!(request.headers()["apns-priority"], "10");
        assert_eq!(request.headers()["apns-topic"], "com.example.myapp");
        assert_eq!(request.headers()["content-length"], "17");
        assert!(request.headers().get("host").is_none());
    }

    #[test]
    fn test_build_request_requires_path() {
        let headers: Headers = [(":scheme", "https"), (":method", "POST"), ("host", "a")].into_iter().collect();
        assert!(matches!(build_request(&headers), Err(TransportError::MissingPseudoHeader(":path"))));
    }

    fn unreachable_endpoint() -> Endpoint {
        Endpoint {
            host: "127.0.0.1".to_string(),
            port: 1,
            cert_path: "/non-existant.pem".to_string(),
            cert_pass: String::new(),
            connect_timeout: Duration::from_millis(100),
        }
    }

    #[tokio::test]
    async fn test_dial_failure_is_reported() {
        let transport = H2Transport::new(unreachable_endpoint());
        let err = transport.new_stream().await.unwrap_err();
        assert!(matches!(err, TransportError::Identity { .. }));
    }

    #[tokio::test]
    async fn test_closed_transport_refuses_streams_without_dialing() {
        let transport = H2Transport::new(unreachable_endpoint());
        transport.close().await;

        let err = transport.new_stream().await.unwrap_err();
        assert!(matches!(err, TransportError::Closed));
    }

    #[tokio::test]
    async fn test_failed_pending_response() {
        let result = PendingResponse::failed(TransportError::StreamNotOpened).await;
        assert!(matches!(result, Err(TransportError::StreamNotOpened)));
    }
}
