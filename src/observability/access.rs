//! Per-request access logging.
//!
//! # Responsibilities
//! - Summarize a finished request as one access line
//! - Guarantee that line is written exactly once, on every exit path
//!
//! # Design Decisions
//! - `RequestLogScope` owns the context; dropping it finishes the response
//!   and then writes the line, so early returns and unwinding handlers are
//!   covered without repeating the logging call
//! - Line format: `status|method|path|encoded_query|client_ip|duration_us`
//! - A handler that unwinds before writing is reported as `500`, the status
//!   the serve entrypoint sends; nothing synthesizes a `200` for it
//! - A request the listener gave up on (timeout, dropped connection) is
//!   reported as `408` once the chain eventually returns

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use axum::http::StatusCode;

use crate::http::context::Context;
use crate::observability::logging::LogSink;
use crate::observability::metrics;

/// Summary of one served request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessEntry {
    pub status: u16,
    pub method: String,
    pub path: String,
    pub query: String,
    pub client_ip: String,
    pub duration_micros: u128,
}

impl AccessEntry {
    pub fn from_context(ctx: &Context<'_>, elapsed: Duration) -> Self {
        Self {
            status: ctx.status().map_or(200, |s| s.as_u16()),
            method: ctx.method().to_string(),
            path: ctx.path().to_string(),
            query: ctx.query().encode(),
            client_ip: ctx.client_ip(),
            duration_micros: elapsed.as_micros(),
        }
    }
}

impl fmt::Display for AccessEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}|{}|{}|{}",
            self.status, self.method, self.path, self.query, self.client_ip, self.duration_micros
        )
    }
}

/// Scope guard around a request's context.
pub struct RequestLogScope<'c, 'l> {
    ctx: Context<'c>,
    sink: &'l dyn LogSink,
    started: Instant,
    abandoned: Option<Arc<AtomicBool>>,
}

impl<'c, 'l> RequestLogScope<'c, 'l> {
    /// Open a scope for a request that started at `started`.
    pub fn new(ctx: Context<'c>, sink: &'l dyn LogSink, started: Instant) -> Self {
        Self {
            ctx,
            sink,
            started,
            abandoned: None,
        }
    }

    /// Flag set by the caller when the client will never see this response.
    pub fn with_abandoned_flag(mut self, abandoned: Option<Arc<AtomicBool>>) -> Self {
        self.abandoned = abandoned;
        self
    }

    fn was_abandoned(&self) -> bool {
        self.abandoned
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Acquire))
    }
}

impl<'c> Deref for RequestLogScope<'c, '_> {
    type Target = Context<'c>;

    fn deref(&self) -> &Self::Target {
        &self.ctx
    }
}

impl DerefMut for RequestLogScope<'_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.ctx
    }
}

impl Drop for RequestLogScope<'_, '_> {
    fn drop(&mut self) {
        let unwinding = thread::panicking();
        if unwinding && !self.ctx.is_written() {
            self.ctx.write_header(StatusCode::INTERNAL_SERVER_ERROR);
        }
        self.ctx.finish();

        let elapsed = self.started.elapsed();
        let mut entry = AccessEntry::from_context(&self.ctx, elapsed);
        if unwinding {
            entry.status = StatusCode::INTERNAL_SERVER_ERROR.as_u16();
        }
        if self.was_abandoned() {
            entry.status = StatusCode::REQUEST_TIMEOUT.as_u16();
        }
        metrics::record_request(&entry.method, entry.status, elapsed);
        self.sink.access(&entry);
    }
}
