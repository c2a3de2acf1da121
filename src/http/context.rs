//! Per-request context.
//!
//! # Responsibilities
//! - Own the incoming request and the write-tracking response writer
//! - Hold path parameters bound from the matched route
//! - Cache the parsed query string
//! - Header, content-type and body helpers for handlers
//!
//! # Design Decisions
//! - Created fresh per request and passed by exclusive reference through the
//!   handler chain; nothing in it is shared across requests
//! - Header helpers take plain strings and log invalid input instead of failing

use std::cell::OnceCell;
use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;

use axum::http::header::{CONTENT_TYPE, LOCATION};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, Request, StatusCode, Uri, Version};
use bytes::Bytes;
use serde::Serialize;
use url::form_urlencoded;

use crate::http::response::{ResponseSink, ResponseWriter};

/// Parsed `application/x-www-form-urlencoded` query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    values: BTreeMap<String, Vec<String>>,
}

impl Query {
    pub fn parse(raw: &str) -> Self {
        let mut values: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
            values
                .entry(key.into_owned())
                .or_default()
                .push(value.into_owned());
        }
        Self { values }
    }

    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .and_then(|v| v.first())
            .map(String::as_str)
    }

    pub fn get_all(&self, key: &str) -> &[String] {
        self.values.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Re-encode with keys in sorted order.
    pub fn encode(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, values) in &self.values {
            for value in values {
                serializer.append_pair(key, value);
            }
        }
        serializer.finish()
    }
}

/// Mutable state for one request, threaded through the handler chain.
pub struct Context<'a> {
    request: Request<Bytes>,
    remote_addr: Option<SocketAddr>,
    response: ResponseWriter<'a>,
    params: HashMap<String, String>,
    query: OnceCell<Query>,
    charset: Option<String>,
}

impl<'a> Context<'a> {
    pub fn new(
        request: Request<Bytes>,
        remote_addr: Option<SocketAddr>,
        sink: &'a mut dyn ResponseSink,
    ) -> Self {
        Self {
            request,
            remote_addr,
            response: ResponseWriter::new(sink),
            params: HashMap::new(),
            query: OnceCell::new(),
            charset: None,
        }
    }

    /// Charset appended to textual content types. Empty disables it.
    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        let charset = charset.into();
        self.charset = (!charset.is_empty()).then_some(charset);
        self
    }

    // Request side

    pub fn request(&self) -> &Request<Bytes> {
        &self.request
    }

    pub fn method(&self) -> &Method {
        self.request.method()
    }

    pub fn uri(&self) -> &Uri {
        self.request.uri()
    }

    pub fn path(&self) -> &str {
        self.request.uri().path()
    }

    pub fn version(&self) -> Version {
        self.request.version()
    }

    /// Parsed query string, cached on first use.
    pub fn query(&self) -> &Query {
        self.query
            .get_or_init(|| Query::parse(self.request.uri().query().unwrap_or("")))
    }

    pub fn headers(&self) -> &HeaderMap {
        self.request.headers()
    }

    /// Request header as a string. Non-UTF-8 values read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.request
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &Bytes {
        self.request.body()
    }

    /// Peer address of the connection, when the listener provides one.
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// Client address: first `X-Forwarded-For` hop, then `X-Real-IP`, then
    /// the peer address. Empty when none is known.
    pub fn client_ip(&self) -> String {
        let forwarded = self
            .header("x-forwarded-for")
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }

        if let Some(ip) = self.header("x-real-ip").map(str::trim).filter(|v| !v.is_empty()) {
            return ip.to_string();
        }

        self.remote_addr
            .map(|addr| addr.ip().to_string())
            .unwrap_or_default()
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    /// Bind a path parameter, replacing any previous value.
    pub fn set_param(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.params.insert(name.into(), value.into());
    }

    // Response side

    pub fn response_headers(&self) -> &HeaderMap {
        self.response.headers()
    }

    /// Set a response header, replacing existing values.
    pub fn set_header(&mut self, name: &str, value: &str) {
        if self.response.is_written() {
            tracing::debug!(header = name, "Response already started, header ignored");
            return;
        }
        let name = match HeaderName::from_bytes(name.as_bytes()) {
            Ok(name) => name,
            Err(e) => {
                tracing::warn!(header = name, error = %e, "Invalid header name");
                return;
            }
        };
        match HeaderValue::from_str(value) {
            Ok(value) => {
                self.response.headers_mut().insert(name, value);
            }
            Err(e) => tracing::warn!(header = %name, error = %e, "Invalid header value"),
        }
    }

    /// Set `Content-Type`, appending the configured charset to textual types
    /// that do not carry one.
    pub fn set_content_type(&mut self, content_type: &str) {
        let value = match &self.charset {
            Some(charset) if is_textual(content_type) && !content_type.contains("charset=") => {
                format!("{}; charset={}", content_type, charset)
            }
            _ => content_type.to_string(),
        };
        self.set_header(CONTENT_TYPE.as_str(), &value);
    }

    pub fn write_header(&mut self, status: StatusCode) {
        self.response.write_header(status);
    }

    pub fn write(&mut self, body: &[u8]) {
        self.response.write(body);
    }

    pub fn write_str(&mut self, body: &str) {
        self.response.write(body.as_bytes());
    }

    /// Write `status` and `body` in one go.
    pub fn abort(&mut self, status: StatusCode, body: &str) {
        self.response.write_header(status);
        self.response.write(body.as_bytes());
    }

    pub fn redirect(&mut self, status: StatusCode, location: &str) {
        self.set_header(LOCATION.as_str(), location);
        self.response.write_header(status);
    }

    /// Serialize `value` as a JSON response. Serialization failures produce
    /// a 500.
    pub fn json<T: Serialize + ?Sized>(&mut self, status: StatusCode, value: &T) {
        match serde_json::to_vec(value) {
            Ok(body) => {
                self.set_content_type("application/json");
                self.response.write_header(status);
                self.response.write(&body);
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize JSON response");
                let status = StatusCode::INTERNAL_SERVER_ERROR;
                self.abort(status, status.canonical_reason().unwrap_or_default());
            }
        }
    }

    /// Whether a status or body has been written. Monotonic.
    pub fn is_written(&self) -> bool {
        self.response.is_written()
    }

    /// Committed response status, if any.
    pub fn status(&self) -> Option<StatusCode> {
        self.response.status()
    }

    pub(crate) fn finish(&mut self) {
        self.response.finish();
    }
}

fn is_textual(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence.starts_with("text/")
        || matches!(
            essence.as_str(),
            "application/json" | "application/javascript" | "application/xml"
        )
}
