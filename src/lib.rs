//! Embeddable HTTP request dispatcher.
//!
//! Routes are `(method, regex path pattern, handler chain)` tuples tried in
//! registration order. The first route whose pattern matches the whole path
//! wins; its named capture groups become path parameters and its handlers run
//! against a per-request [`Context`] until one of them starts the response.
//!
//! ```no_run
//! use route_dispatch::{handler, Server};
//! use axum::http::Method;
//!
//! let mut server = Server::new();
//! server.route(
//!     Method::GET,
//!     "/user/(?P<id>[0-9]+)",
//!     [handler(|ctx| {
//!         let body = format!("id={}", ctx.param("id").unwrap_or_default());
//!         ctx.write_str(&body);
//!     })],
//! );
//! let app = server.into_router();
//! # let _ = app;
//! ```

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;

pub use config::ServerConfig;
pub use http::{handler, Context, Handler, ResponseSink, Server};
pub use lifecycle::Shutdown;
pub use observability::{AccessEntry, LogSink, NoopLogSink, TracingLogSink};
pub use routing::{Pattern, PatternError, RouteTable};
