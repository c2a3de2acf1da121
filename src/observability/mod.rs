//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Every dispatched request:
//!     → access.rs (scope guard closes the response, builds the access line)
//!     → logging.rs (LogSink: access line, debug dumps)
//!     → metrics.rs (request counter, latency histogram)
//!
//! Consumers:
//!     → tracing subscriber (stdout)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Exactly one access line per request, on every exit path
//! - Log sink injected per server, defaulting to `tracing`

pub mod access;
pub mod logging;
pub mod metrics;

pub use access::{AccessEntry, RequestLogScope};
pub use logging::{init_logging, LogSink, NoopLogSink, TracingLogSink};
