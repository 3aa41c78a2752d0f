//! Route groups.

use daedalus_middleware::{BoxedMiddleware, Middleware};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// A pattern prefix whose middleware is inherited by every route in it.
///
/// Routes hold weak references to their groups and copy the group
/// middleware into their own chain when they are finalized. Middleware
/// added to a group after that point does not reach routes already
/// finalized.
pub struct RouteGroup {
    pattern: String,
    middleware: RwLock<Vec<BoxedMiddleware>>,
}

impl RouteGroup {
    /// Creates a group for `pattern`.
    pub fn new(pattern: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            pattern: pattern.into(),
            middleware: RwLock::new(Vec::new()),
        })
    }

    /// Returns the pattern prefix.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Appends a middleware to the group.
    pub fn add<M: Middleware>(&self, middleware: M) -> &Self {
        self.add_boxed(Arc::new(middleware))
    }

    /// Appends a shared middleware to the group.
    pub fn add_boxed(&self, middleware: BoxedMiddleware) -> &Self {
        self.middleware.write().push(middleware);
        self
    }

    /// Returns a snapshot of the group middleware, in registration order.
    #[must_use]
    pub fn middleware(&self) -> Vec<BoxedMiddleware> {
        self.middleware.read().clone()
    }
}

impl fmt::Debug for RouteGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let middleware = self.middleware.read();
        f.debug_struct("RouteGroup")
            .field("pattern", &self.pattern)
            .field(
                "middleware",
                &middleware.iter().map(|m| m.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
