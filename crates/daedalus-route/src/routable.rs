//! State shared by routes: pattern, callable and pending middleware.

use daedalus_core::{CallableRef, CallableResolver, DispatchError, DispatchResult, Handler};
use daedalus_middleware::{BoxedMiddleware, Middleware};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// A pattern and a callable, plus the middleware registered against them.
///
/// The callable is resolved lazily: an identifier is looked up through the
/// configured [`CallableResolver`] on first use and the resulting handler
/// replaces it. Concurrent first uses resolve once.
pub struct Routable {
    pattern: String,
    callable: Mutex<CallableRef>,
    resolver: Option<Arc<dyn CallableResolver>>,
    middleware: Vec<BoxedMiddleware>,
}

impl Routable {
    /// Creates a routable for `pattern` invoking `callable`.
    pub fn new(pattern: impl Into<String>, callable: impl Into<CallableRef>) -> Self {
        Self {
            pattern: pattern.into(),
            callable: Mutex::new(callable.into()),
            resolver: None,
            middleware: Vec::new(),
        }
    }

    /// Returns the URL pattern.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Replaces the URL pattern.
    pub fn set_pattern(&mut self, pattern: impl Into<String>) {
        self.pattern = pattern.into();
    }

    /// Returns the current callable reference.
    #[must_use]
    pub fn callable(&self) -> CallableRef {
        self.callable.lock().clone()
    }

    /// Replaces the callable; an identifier will be resolved again on next use.
    pub fn set_callable(&mut self, callable: impl Into<CallableRef>) {
        *self.callable.get_mut() = callable.into();
    }

    /// Sets the resolver used for callable identifiers.
    pub fn set_resolver(&mut self, resolver: Arc<dyn CallableResolver>) {
        self.resolver = Some(resolver);
    }

    /// Appends a middleware to the pending list.
    pub fn add<M: Middleware>(&mut self, middleware: M) -> &mut Self {
        self.add_boxed(Arc::new(middleware))
    }

    /// Appends a shared middleware to the pending list.
    pub fn add_boxed(&mut self, middleware: BoxedMiddleware) -> &mut Self {
        self.middleware.push(middleware);
        self
    }

    /// Returns the pending middleware, in registration order.
    #[must_use]
    pub fn middleware(&self) -> &[BoxedMiddleware] {
        &self.middleware
    }

    pub(crate) fn replace_middleware(&mut self, middleware: Vec<BoxedMiddleware>) {
        self.middleware = middleware;
    }

    /// Returns the invocable handler, resolving an identifier if needed.
    ///
    /// A failed resolution leaves the stored reference untouched.
    pub fn resolve_callable(&self) -> DispatchResult<Arc<dyn Handler>> {
        let mut callable = self.callable.lock();
        if let CallableRef::Handler(handler) = &*callable {
            return Ok(Arc::clone(handler));
        }

        let identifier = callable.identifier().unwrap_or_default();
        let resolver = self.resolver.as_ref().ok_or_else(|| {
            DispatchError::resolution(identifier.as_str(), "no callable resolver configured")
        })?;

        let handler = resolver.resolve(&callable)?;
        tracing::debug!(callable = %identifier, pattern = %self.pattern, "callable resolved");
        *callable = CallableRef::Handler(Arc::clone(&handler));
        Ok(handler)
    }
}

impl fmt::Debug for Routable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Routable")
            .field("pattern", &self.pattern)
            .field("callable", &*self.callable.lock())
            .field(
                "middleware",
                &self.middleware.iter().map(|m| m.name()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}
