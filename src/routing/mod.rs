//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Registration (setup phase):
//!     (method, path spec, handlers)
//!     → pattern.rs (parse, anchor, compile)
//!     → router.rs (append to ordered table)
//!
//! Incoming request (method, path):
//!     → router.rs (scan in registration order)
//!     → pattern.rs (full-string match, named captures)
//!     → Return: matched route + params, or no match
//! ```
//!
//! # Design Decisions
//! - Routes compiled at registration, immutable while serving
//! - Deterministic: same input always matches same route
//! - First match wins (ordered by registration)

pub mod pattern;
pub mod router;

pub use pattern::{Pattern, PatternError, PatternMatch};
pub use router::{Route, RouteMatch, RouteTable};
