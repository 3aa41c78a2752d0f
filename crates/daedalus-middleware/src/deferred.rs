//! Middleware registered by identifier.
//!
//! Routes and groups may name a middleware instead of constructing it. A
//! [`DeferredMiddleware`] stands in for it in the chain and asks a
//! [`MiddlewareResolver`] for the real layer the first time a request passes
//! through; later requests reuse the resolved instance.

use crate::middleware::{Middleware, Next};
use crate::stack::BoxedMiddleware;
use daedalus_core::{BoxFuture, DispatchError, DispatchResult, Request, Response};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Turns middleware identifiers into middleware instances.
pub trait MiddlewareResolver: Send + Sync + 'static {
    /// Resolves `identifier`.
    fn resolve(&self, identifier: &str) -> DispatchResult<BoxedMiddleware>;
}

/// A middleware resolved from its identifier on first use.
pub struct DeferredMiddleware {
    identifier: String,
    resolver: Arc<dyn MiddlewareResolver>,
    resolved: OnceLock<BoxedMiddleware>,
}

impl DeferredMiddleware {
    /// Creates a placeholder for the middleware named `identifier`.
    pub fn new(identifier: impl Into<String>, resolver: Arc<dyn MiddlewareResolver>) -> Self {
        Self {
            identifier: identifier.into(),
            resolver,
            resolved: OnceLock::new(),
        }
    }

    /// Returns whether the identifier has been resolved.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.resolved.get().is_some()
    }

    fn target(&self) -> DispatchResult<&BoxedMiddleware> {
        if let Some(middleware) = self.resolved.get() {
            return Ok(middleware);
        }

        let middleware = self.resolver.resolve(&self.identifier)?;
        tracing::debug!(
            identifier = %self.identifier,
            middleware = middleware.name(),
            "deferred middleware resolved"
        );
        Ok(self.resolved.get_or_init(|| middleware))
    }
}

impl Middleware for DeferredMiddleware {
    fn name(&self) -> &str {
        &self.identifier
    }

    fn process<'a>(
        &'a self,
        request: Request,
        response: Response,
        next: Next<'a>,
    ) -> BoxFuture<'a, DispatchResult<Response>> {
        Box::pin(async move {
            let middleware = self.target()?;
            middleware.process(request, response, next).await
        })
    }
}

impl fmt::Debug for DeferredMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredMiddleware")
            .field("identifier", &self.identifier)
            .field("resolved", &self.is_resolved())
            .finish_non_exhaustive()
    }
}

/// A name-keyed middleware registry.
#[derive(Default)]
pub struct MiddlewareRegistry {
    entries: HashMap<String, BoxedMiddleware>,
}

impl MiddlewareRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a middleware under `identifier`, replacing any previous one.
    pub fn register<M: Middleware>(&mut self, identifier: impl Into<String>, middleware: M) {
        self.entries.insert(identifier.into(), Arc::new(middleware));
    }

    /// Registers a shared middleware under `identifier`.
    pub fn register_arc(&mut self, identifier: impl Into<String>, middleware: BoxedMiddleware) {
        self.entries.insert(identifier.into(), middleware);
    }

    /// Returns whether a middleware is registered under `identifier`.
    #[must_use]
    pub fn contains(&self, identifier: &str) -> bool {
        self.entries.contains_key(identifier)
    }

    /// Returns the number of registered middleware.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl MiddlewareResolver for MiddlewareRegistry {
    fn resolve(&self, identifier: &str) -> DispatchResult<BoxedMiddleware> {
        self.entries
            .get(identifier)
            .cloned()
            .ok_or_else(|| DispatchError::resolution(identifier, "middleware does not exist"))
    }
}

impl fmt::Debug for MiddlewareRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareRegistry")
            .field("entries", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}
