//! HTTP server and dispatch engine.
//!
//! # Responsibilities
//! - Route registration (setup phase)
//! - Dispatch one request: default headers, route lookup, parameter binding,
//!   handler chain with short-circuit, 404 fallback
//! - Optional debug capture of request and response
//! - Expose the dispatcher as an axum router and serve it on a listener
//!
//! # Design Decisions
//! - The route table is only mutated through `&mut self`; serving consumes
//!   the server into an `Arc`, so registration and dispatch never overlap
//! - Handlers are synchronous and may block; the axum entrypoint runs each
//!   dispatch on the blocking pool
//! - The core never catches handler failures

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Method, Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use bytes::Bytes;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::timeout::TimeoutLayer;

use crate::config::{DispatchConfig, ServerConfig};
use crate::http::context::Context;
use crate::http::debug::{self, DebugCapture};
use crate::http::handler::Handler;
use crate::http::response::{BufferedResponse, ResponseSink};
use crate::observability::access::RequestLogScope;
use crate::observability::logging::{LogSink, TracingLogSink};
use crate::routing::RouteTable;

/// Value of the `X-Powered-By` header set on every response.
pub const POWERED_BY: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Request dispatcher: an ordered route table plus per-request plumbing.
pub struct Server {
    routes: RouteTable,
    log_sink: Arc<dyn LogSink>,
    dispatch: DispatchConfig,
    request_timeout: Duration,
}

impl Server {
    /// Create a server with default settings.
    pub fn new() -> Self {
        Self::from_config(&ServerConfig::default())
    }

    /// Create a server from configuration.
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            routes: RouteTable::new(),
            log_sink: Arc::new(TracingLogSink),
            dispatch: config.dispatch.clone(),
            request_timeout: Duration::from_secs(config.timeouts.request_secs),
        }
    }

    /// Replace the access/debug log sink.
    pub fn with_log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.log_sink = sink;
        self
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.dispatch.debug = debug;
    }

    pub fn debug(&self) -> bool {
        self.dispatch.debug
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Register a route.
    ///
    /// A malformed pattern is logged and the route dropped; the remaining
    /// routes are unaffected.
    pub fn route<I>(&mut self, method: Method, spec: &str, handlers: I)
    where
        I: IntoIterator<Item = Arc<dyn Handler>>,
    {
        let handlers: Vec<_> = handlers.into_iter().collect();
        match self.routes.add(method.clone(), spec, handlers) {
            Ok(route) => tracing::debug!(
                method = %method,
                pattern = spec,
                handlers = route.handlers().len(),
                "Route registered"
            ),
            Err(e) => tracing::warn!(method = %method, error = %e, "Can not add route"),
        }
    }

    pub fn get(&mut self, spec: &str, handler: impl Handler) {
        self.route(Method::GET, spec, [Arc::new(handler) as Arc<dyn Handler>]);
    }

    pub fn post(&mut self, spec: &str, handler: impl Handler) {
        self.route(Method::POST, spec, [Arc::new(handler) as Arc<dyn Handler>]);
    }

    pub fn put(&mut self, spec: &str, handler: impl Handler) {
        self.route(Method::PUT, spec, [Arc::new(handler) as Arc<dyn Handler>]);
    }

    pub fn patch(&mut self, spec: &str, handler: impl Handler) {
        self.route(Method::PATCH, spec, [Arc::new(handler) as Arc<dyn Handler>]);
    }

    pub fn delete(&mut self, spec: &str, handler: impl Handler) {
        self.route(Method::DELETE, spec, [Arc::new(handler) as Arc<dyn Handler>]);
    }

    pub fn head(&mut self, spec: &str, handler: impl Handler) {
        self.route(Method::HEAD, spec, [Arc::new(handler) as Arc<dyn Handler>]);
    }

    pub fn options(&mut self, spec: &str, handler: impl Handler) {
        self.route(Method::OPTIONS, spec, [Arc::new(handler) as Arc<dyn Handler>]);
    }

    /// Dispatch one request, writing the response into `sink`.
    pub fn dispatch(
        &self,
        request: Request<Bytes>,
        remote_addr: Option<SocketAddr>,
        sink: &mut dyn ResponseSink,
    ) {
        self.dispatch_tracked(request, remote_addr, sink, None);
    }

    /// Like [`dispatch`](Self::dispatch), with a flag the caller raises when
    /// the client stopped waiting; the access line then reports `408`.
    fn dispatch_tracked(
        &self,
        request: Request<Bytes>,
        remote_addr: Option<SocketAddr>,
        sink: &mut dyn ResponseSink,
        abandoned: Option<Arc<AtomicBool>>,
    ) {
        let started = Instant::now();

        if self.dispatch.debug {
            debug::log_request(&*self.log_sink, &request);
            let mut capture = DebugCapture::new(sink, &*self.log_sink, request.version());
            self.run_chain(Context::new(request, remote_addr, &mut capture), started, abandoned);
        } else {
            self.run_chain(Context::new(request, remote_addr, sink), started, abandoned);
        }
    }

    fn run_chain(&self, ctx: Context<'_>, started: Instant, abandoned: Option<Arc<AtomicBool>>) {
        let ctx = ctx.with_charset(self.dispatch.charset.as_str());
        let mut ctx =
            RequestLogScope::new(ctx, &*self.log_sink, started).with_abandoned_flag(abandoned);

        ctx.set_header("X-Powered-By", POWERED_BY);
        ctx.set_content_type("text/plain");

        let found = self.routes.find(ctx.method(), ctx.path()).map(|hit| {
            let params: Vec<(String, String)> = hit
                .params
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect();
            (hit.route, params)
        });

        let Some((route, params)) = found else {
            let status = StatusCode::NOT_FOUND;
            ctx.abort(status, status.canonical_reason().unwrap_or_default());
            return;
        };

        if !params.is_empty() {
            for (name, value) in params {
                ctx.set_param(name, value);
            }
            tracing::debug!(params = ?ctx.params(), "Path parameters bound");
        }

        for handler in route.handlers() {
            handler.call(&mut ctx);
            if ctx.is_written() {
                break;
            }
        }
    }

    /// Build the axum router serving this dispatcher.
    #[allow(deprecated)]
    pub fn into_router(self) -> Router {
        let timeout = self.request_timeout;
        Router::new()
            .fallback(serve_request)
            .with_state(Arc::new(self))
            .layer(TimeoutLayer::new(timeout))
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            routes = self.routes.len(),
            debug = self.dispatch.debug,
            "HTTP server starting"
        );

        let app = self
            .into_router()
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

/// Fallback handler: buffer the body and dispatch on the blocking pool.
async fn serve_request(State(server): State<Arc<Server>>, request: Request<Body>) -> Response {
    let remote_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, server.dispatch.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read request body");
            return (StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large").into_response();
        }
    };
    let request = Request::from_parts(parts, body);

    // Dropped without `complete` when the timeout layer or the connection
    // cancels this future while the handler chain is still running.
    let pending = PendingDispatch::new();
    let abandoned = pending.flag();
    let dispatched = tokio::task::spawn_blocking(move || {
        let mut out = BufferedResponse::new();
        server.dispatch_tracked(request, remote_addr, &mut out, Some(abandoned));
        out
    })
    .await;
    pending.complete();

    match dispatched {
        Ok(out) => out.into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Dispatch task failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    }
}

/// Raises the abandoned flag on drop unless the dispatch completed.
struct PendingDispatch {
    abandoned: Option<Arc<AtomicBool>>,
}

impl PendingDispatch {
    fn new() -> Self {
        Self {
            abandoned: Some(Arc::new(AtomicBool::new(false))),
        }
    }

    fn flag(&self) -> Arc<AtomicBool> {
        self.abandoned.clone().unwrap_or_default()
    }

    fn complete(mut self) {
        self.abandoned = None;
    }
}

impl Drop for PendingDispatch {
    fn drop(&mut self) {
        if let Some(flag) = &self.abandoned {
            flag.store(true, Ordering::Release);
        }
    }
}
