//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! axum fallback (server.rs)
//!     → buffer body, hand off to the blocking pool
//!     → [debug.rs dumps request, swaps in a capturing sink] (debug mode)
//!     → context.rs (per-request state, default headers)
//!     → routing (first full match, bind params)
//!     → handler.rs chain until response.rs reports a write
//!     → access line, response back to axum
//! ```

pub mod context;
pub mod debug;
pub mod handler;
pub mod response;
pub mod server;

pub use context::{Context, Query};
pub use handler::{handler, Handler};
pub use response::{BufferedResponse, ResponseSink, ResponseWriter};
pub use server::{Server, POWERED_BY};
