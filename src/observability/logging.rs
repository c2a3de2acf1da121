//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber
//! - Define the sink the dispatcher writes access and debug lines to
//!
//! # Design Decisions
//! - The sink is injected into the server at construction, not global state
//! - The default sink forwards to `tracing` under dedicated targets so access
//!   and debug output can be filtered independently
//! - Log level comes from `RUST_LOG` first, then the config

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;
use crate::observability::access::AccessEntry;

/// Target of per-request access lines.
pub const ACCESS_TARGET: &str = "route_dispatch::access";

/// Target of debug request/response dumps.
pub const DEBUG_TARGET: &str = "route_dispatch::debug";

/// Destination for the dispatcher's request-scoped log output.
pub trait LogSink: Send + Sync {
    /// One access line per request.
    fn access(&self, entry: &AccessEntry);

    /// One line of a debug dump.
    fn debug(&self, line: &str);
}

/// Forwards to the installed `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn access(&self, entry: &AccessEntry) {
        tracing::info!(target: ACCESS_TARGET, "{}", entry);
    }

    fn debug(&self, line: &str) {
        tracing::debug!(target: DEBUG_TARGET, "{}", line);
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLogSink;

impl LogSink for NoopLogSink {
    fn access(&self, _entry: &AccessEntry) {}

    fn debug(&self, _line: &str) {}
}

/// Install the global subscriber: env filter plus a fmt layer.
pub fn init_logging(config: &ObservabilityConfig) -> Result<(), TryInitError> {
    let fallback = format!(
        "route_dispatch={level},tower_http={level}",
        level = config.log_level
    );
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback.into()))
        .with(tracing_subscriber::fmt::layer())
        .try_init()
}
