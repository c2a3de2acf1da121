//! Route table and lookup.
//!
//! # Responsibilities
//! - Store registered routes in insertion order
//! - Look up the first route whose method and pattern match a request
//! - Return the matched route plus its named captures, or no match
//!
//! # Design Decisions
//! - Append-only: routes are never merged, replaced or deduplicated
//! - Populated during setup, read-only while serving (shared without locks)
//! - O(n) scan in registration order; first full match wins regardless of
//!   specificity

use std::fmt;
use std::sync::Arc;

use axum::http::Method;

use crate::http::handler::Handler;
use crate::routing::pattern::{Pattern, PatternError};

/// A registered `(method, pattern, handler chain)` tuple.
pub struct Route {
    method: Method,
    pattern: Pattern,
    handlers: Vec<Arc<dyn Handler>>,
}

impl Route {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// The handler chain, in invocation order.
    pub fn handlers(&self) -> &[Arc<dyn Handler>] {
        &self.handlers
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("pattern", &self.pattern.as_str())
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

/// A route hit: the route and its named captures for the request path.
#[derive(Debug)]
pub struct RouteMatch<'r, 'p> {
    pub route: &'r Route,
    pub params: Vec<(&'r str, &'p str)>,
}

/// Ordered, append-only table of routes.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile `spec` and append a route.
    ///
    /// Nothing is appended when the pattern fails to compile.
    pub fn add(
        &mut self,
        method: Method,
        spec: &str,
        handlers: Vec<Arc<dyn Handler>>,
    ) -> Result<&Route, PatternError> {
        let pattern = Pattern::compile(spec)?;
        self.routes.push(Route {
            method,
            pattern,
            handlers,
        });
        let index = self.routes.len() - 1;
        Ok(&self.routes[index])
    }

    /// Find the first route matching `method` and the whole of `path`.
    pub fn find<'r, 'p>(&'r self, method: &Method, path: &'p str) -> Option<RouteMatch<'r, 'p>> {
        self.routes
            .iter()
            .filter(|route| route.method == *method)
            .find_map(|route| {
                route.pattern.matches(path).map(|found| RouteMatch {
                    route,
                    params: route.pattern.named_values(&found),
                })
            })
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }
}
