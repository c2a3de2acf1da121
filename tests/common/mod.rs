//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::http::Request;
use bytes::Bytes;
use tokio::net::TcpListener;

use route_dispatch::http::BufferedResponse;
use route_dispatch::{AccessEntry, LogSink, Server, Shutdown};

/// Log sink that keeps everything in memory.
#[derive(Default)]
pub struct MemoryLogSink {
    access: Mutex<Vec<AccessEntry>>,
    debug: Mutex<Vec<String>>,
}

impl MemoryLogSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn access_entries(&self) -> Vec<AccessEntry> {
        self.access.lock().unwrap().clone()
    }

    pub fn access_lines(&self) -> Vec<String> {
        self.access
            .lock()
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    pub fn debug_lines(&self) -> Vec<String> {
        self.debug.lock().unwrap().clone()
    }
}

impl LogSink for MemoryLogSink {
    fn access(&self, entry: &AccessEntry) {
        self.access.lock().unwrap().push(entry.clone());
    }

    fn debug(&self, line: &str) {
        self.debug.lock().unwrap().push(line.to_string());
    }
}

/// Server writing its logs into the returned sink.
pub fn server_with_memory_log() -> (Server, Arc<MemoryLogSink>) {
    let log = MemoryLogSink::new();
    let server = Server::new().with_log_sink(log.clone());
    (server, log)
}

pub fn request(method: &str, uri: &str) -> Request<Bytes> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Bytes::new())
        .unwrap()
}

/// Dispatch into a fresh buffer.
pub fn dispatch(server: &Server, request: Request<Bytes>) -> BufferedResponse {
    let mut out = BufferedResponse::new();
    server.dispatch(request, None, &mut out);
    out
}

/// Serve on an ephemeral localhost port.
pub async fn start_server(server: Server) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(100)).await;
    (addr, shutdown)
}
