//! Debug capture of requests and responses.
//!
//! # Responsibilities
//! - Dump the raw incoming request to the log sink before dispatch
//! - Buffer the response in memory while the handler chain runs
//! - Log the buffered response, then replay it onto the real sink
//!
//! # Design Decisions
//! - The replayed head, headers and body are exactly the logged ones
//! - Request lines are prefixed `> `, response lines `< `, and the
//!   header/body separator is a bare `<`

use axum::http::{HeaderMap, Request, StatusCode, Version};
use bytes::Bytes;

use crate::http::response::{BufferedResponse, ResponseSink};
use crate::observability::logging::LogSink;

/// Raw request as text lines: request line, headers, blank line, body.
pub fn dump_request(request: &Request<Bytes>) -> Vec<String> {
    let target = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    let mut lines = vec![format!("{} {} {:?}", request.method(), target, request.version())];
    lines.extend(header_lines(request.headers()));
    lines.push(String::new());
    if !request.body().is_empty() {
        lines.extend(body_lines(request.body()));
    }
    lines
}

/// Response as text lines: status line, headers, blank line, body.
pub fn dump_response(version: Version, response: &BufferedResponse) -> Vec<String> {
    let status = response.status();
    let mut lines = vec![status_line(version, status)];
    lines.extend(header_lines(response.headers()));
    lines.push(String::new());
    lines.extend(body_lines(response.body()));
    lines
}

/// Write a request dump to `sink`.
pub fn log_request(sink: &dyn LogSink, request: &Request<Bytes>) {
    for line in dump_request(request) {
        sink.debug(&format!("> {}", line));
    }
}

fn status_line(version: Version, status: StatusCode) -> String {
    format!(
        "{:?} {} {}",
        version,
        status.as_u16(),
        status.canonical_reason().unwrap_or_default()
    )
}

fn header_lines(headers: &HeaderMap) -> impl Iterator<Item = String> + '_ {
    headers.iter().map(|(name, value)| {
        format!(
            "{}: {}",
            name.as_str(),
            String::from_utf8_lossy(value.as_bytes())
        )
    })
}

fn body_lines(body: &[u8]) -> impl Iterator<Item = String> + '_ {
    body.split(|b| *b == b'\n')
        .map(|line| String::from_utf8_lossy(line).into_owned())
}

/// Response sink that captures the response, logs it on finish, and replays
/// it onto the wrapped sink.
pub struct DebugCapture<'s> {
    inner: &'s mut dyn ResponseSink,
    log: &'s dyn LogSink,
    version: Version,
    recorded: BufferedResponse,
}

impl<'s> DebugCapture<'s> {
    pub fn new(inner: &'s mut dyn ResponseSink, log: &'s dyn LogSink, version: Version) -> Self {
        Self {
            inner,
            log,
            version,
            recorded: BufferedResponse::new(),
        }
    }

    pub fn recorded(&self) -> &BufferedResponse {
        &self.recorded
    }
}

impl ResponseSink for DebugCapture<'_> {
    fn write_head(&mut self, status: StatusCode, headers: &HeaderMap) {
        self.recorded.write_head(status, headers);
    }

    fn write_body(&mut self, chunk: &[u8]) {
        self.recorded.write_body(chunk);
    }

    fn finish(&mut self) {
        let lines = dump_response(self.version, &self.recorded);
        // The blank separator sits right after the headers.
        let separator = self.recorded.headers().len() + 1;
        for (index, line) in lines.iter().enumerate() {
            if index == separator {
                self.log.debug("<");
            } else {
                self.log.debug(&format!("< {}", line));
            }
        }

        self.inner
            .write_head(self.recorded.status(), self.recorded.headers());
        if !self.recorded.body().is_empty() {
            self.inner.write_body(self.recorded.body());
        }
        self.inner.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::access::AccessEntry;
    use axum::http::header::CONTENT_TYPE;
    use axum::http::HeaderValue;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Lines(Mutex<Vec<String>>);

    impl LogSink for Lines {
        fn access(&self, _entry: &AccessEntry) {}

        fn debug(&self, line: &str) {
            self.0.lock().unwrap().push(line.to_string());
        }
    }

    #[test]
    fn test_request_dump() {
        let request = Request::builder()
            .method("POST")
            .uri("/echo?x=1")
            .header("host", "example.com")
            .body(Bytes::from_static(b"one\ntwo"))
            .unwrap();

        let lines = Lines::default();
        log_request(&lines, &request);
        assert_eq!(
            lines.0.into_inner().unwrap(),
            vec![
                "> POST /echo?x=1 HTTP/1.1",
                "> host: example.com",
                "> ",
                "> one",
                "> two",
            ]
        );
    }

    #[test]
    fn test_capture_logs_then_replays() {
        let lines = Lines::default();
        let mut client = BufferedResponse::new();
        {
            let mut capture = DebugCapture::new(&mut client, &lines, Version::HTTP_11);
            let mut headers = HeaderMap::new();
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
            capture.write_head(StatusCode::NOT_FOUND, &headers);
            capture.write_body(b"Not Found");
            assert_eq!(capture.recorded().body(), b"Not Found");
            capture.finish();
        }

        assert_eq!(client.status(), StatusCode::NOT_FOUND);
        assert_eq!(client.headers()[CONTENT_TYPE], "text/plain");
        assert_eq!(client.body(), b"Not Found");
        assert_eq!(
            lines.0.into_inner().unwrap(),
            vec![
                "< HTTP/1.1 404 Not Found",
                "< content-type: text/plain",
                "<",
                "< Not Found",
            ]
        );
    }
}
