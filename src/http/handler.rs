//! Handler callables.

use std::sync::Arc;

use crate::http::context::Context;

/// One link of a route's handler chain.
///
/// Handlers run synchronously against the request's [`Context`] and may block;
/// the dispatcher imposes no timeout or cancellation. A handler signals that
/// the chain is done by writing a status or body.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, ctx: &mut Context<'_>);
}

impl<F> Handler for F
where
    F: Fn(&mut Context<'_>) + Send + Sync + 'static,
{
    fn call(&self, ctx: &mut Context<'_>) {
        self(ctx)
    }
}

/// Wrap a closure for use in a route's chain.
///
/// The `Fn` bound lets closure parameter types be inferred.
pub fn handler<F>(f: F) -> Arc<dyn Handler>
where
    F: Fn(&mut Context<'_>) + Send + Sync + 'static,
{
    Arc::new(f)
}
