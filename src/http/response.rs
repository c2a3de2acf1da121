//! Response sinks and write tracking.
//!
//! # Responsibilities
//! - Define the capability interface handlers ultimately write through
//! - Track whether a response has started (the chain short-circuit signal)
//! - Buffer a complete response in memory for the axum entrypoint
//!
//! # Design Decisions
//! - `ResponseWriter` decorates a sink instead of extending it; the sink only
//!   sees a committed head and body chunks
//! - Write-state is monotonic: once the head is committed it never resets
//! - Headers are collected until the head is committed, then frozen

use axum::body::Body;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use bytes::BytesMut;

/// Destination of a response: the client connection, a buffer, or a capture.
pub trait ResponseSink {
    /// Commit the status line and headers. Called at most once.
    fn write_head(&mut self, status: StatusCode, headers: &HeaderMap);

    /// Append a body chunk. Only called after `write_head`.
    fn write_body(&mut self, chunk: &[u8]);

    /// The response is complete.
    fn finish(&mut self) {}
}

/// An in-memory response.
#[derive(Debug, Default, Clone)]
pub struct BufferedResponse {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: BytesMut,
}

impl BufferedResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed status, `200 OK` if the head was never written.
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn is_committed(&self) -> bool {
        self.status.is_some()
    }

    /// Convert into an axum response.
    pub fn into_response(self) -> Response {
        let status = self.status();
        let mut response = Response::new(Body::from(self.body.freeze()));
        *response.status_mut() = status;
        *response.headers_mut() = self.headers;
        response
    }
}

impl ResponseSink for BufferedResponse {
    fn write_head(&mut self, status: StatusCode, headers: &HeaderMap) {
        if self.status.is_some() {
            return;
        }
        self.status = Some(status);
        self.headers = headers.clone();
    }

    fn write_body(&mut self, chunk: &[u8]) {
        self.body.extend_from_slice(chunk);
    }
}

/// Write-tracking wrapper around a [`ResponseSink`].
pub struct ResponseWriter<'a> {
    sink: &'a mut dyn ResponseSink,
    headers: HeaderMap,
    status: Option<StatusCode>,
    finished: bool,
}

impl<'a> ResponseWriter<'a> {
    pub fn new(sink: &'a mut dyn ResponseSink) -> Self {
        Self {
            sink,
            headers: HeaderMap::new(),
            status: None,
            finished: false,
        }
    }

    /// Response headers. Changes after [`is_written`](Self::is_written) have
    /// no effect on the response.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Commit the status line and the current headers.
    ///
    /// Only the first call takes effect.
    pub fn write_header(&mut self, status: StatusCode) {
        if let Some(current) = self.status {
            tracing::warn!(
                current = current.as_u16(),
                ignored = status.as_u16(),
                "Superfluous write_header call"
            );
            return;
        }
        self.sink.write_head(status, &self.headers);
        self.status = Some(status);
    }

    /// Write a body chunk, committing `200 OK` first if no status was written.
    pub fn write(&mut self, chunk: &[u8]) {
        if self.status.is_none() {
            self.write_header(StatusCode::OK);
        }
        if !chunk.is_empty() {
            self.sink.write_body(chunk);
        }
    }

    /// Whether the response has started. Never resets once true.
    pub fn is_written(&self) -> bool {
        self.status.is_some()
    }

    /// The committed status, if any.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Commit an empty `200 OK` if nothing was written, then finish the sink.
    /// Idempotent.
    pub fn finish(&mut self) {
        if self.finished {
            return;
        }
        if self.status.is_none() {
            self.write_header(StatusCode::OK);
        }
        self.sink.finish();
        self.finished = true;
    }
}
