#![allow(dead_code)]

use apns_h2::{ConnectionOptions, Headers, PushOptions, Stream, Transport};
use async_trait::async_trait;
use bytes::Bytes;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

static INIT: Once = Once::new();

pub fn setup_tracing() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "warn".into())
            .add_directive("apns_h2=debug".parse().unwrap())
            .add_directive("h2=warn".parse().unwrap());

        tracing_subscriber::fmt().with_env_filter(filter).with_test_writer().init();
    });
}

/// A file that exists on disk; its contents never get parsed by these tests.
pub fn cert_file() -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "-----BEGIN CERTIFICATE-----").unwrap();
    writeln!(file, "-----END CERTIFICATE-----").unwrap();
    file
}

pub fn cert_path(file: &tempfile::NamedTempFile) -> String {
    file.path().to_string_lossy().into_owned()
}

pub fn options(file: &tempfile::NamedTempFile) -> ConnectionOptions {
    ConnectionOptions::new(cert_path(file), "")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    NewStream { stream: usize },
    Headers { stream: usize, headers: Headers, end_stream: bool },
    Data { stream: usize, data: Bytes, end_stream: bool },
    Response { stream: usize, options: PushOptions },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeError {
    NoStream,
    WriteFailed,
}

/// What the recording stream hands back from `response`.
#[derive(Debug, PartialEq, Eq)]
pub struct FakeResponse {
    pub stream: usize,
    pub options: PushOptions,
}

/// A transport that records every call made on it and its streams.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    calls: Arc<Mutex<Vec<Call>>>,
    next_stream: AtomicUsize,
    fail_new_stream: bool,
    fail_data: bool,
}

impl RecordingTransport {
    /// Refuses to open any stream.
    pub fn failing_new_stream() -> Self {
        Self { fail_new_stream: true, ..Self::default() }
    }

    /// Opens streams whose body write fails.
    pub fn failing_data() -> Self {
        Self { fail_data: true, ..Self::default() }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

#[derive(Debug)]
pub struct RecordingStream {
    id: usize,
    calls: Arc<Mutex<Vec<Call>>>,
    fail_data: bool,
}

#[async_trait]
impl Transport for RecordingTransport {
    type Stream = RecordingStream;
    type Error = FakeError;

    async fn new_stream(&self) -> Result<RecordingStream, FakeError> {
        if self.fail_new_stream {
            return Err(FakeError::NoStream);
        }
        let id = self.next_stream.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push(Call::NewStream { stream: id });
        Ok(RecordingStream { id, calls: Arc::clone(&self.calls), fail_data: self.fail_data })
    }
}

#[async_trait]
impl Stream for RecordingStream {
    type Error = FakeError;
    type Response = FakeResponse;

    async fn headers(&mut self, headers: Headers, end_stream: bool) -> Result<(), FakeError> {
        self.calls.lock().unwrap().push(Call::Headers { stream: self.id, headers, end_stream });
        tokio::task::yield_now().await;
        Ok(())
    }

    async fn data(&mut self, data: Bytes, end_stream: bool) -> Result<(), FakeError> {
        if self.fail_data {
            return Err(FakeError::WriteFailed);
        }
        self.calls.lock().unwrap().push(Call::Data { stream: self.id, data, end_stream });
        Ok(())
    }

    fn response(self, options: PushOptions) -> FakeResponse {
        self.calls.lock().unwrap().push(Call::Response { stream: self.id, options: options.clone() });
        FakeResponse { stream: self.id, options }
    }
}
