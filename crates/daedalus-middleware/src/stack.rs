//! Lazily-built middleware stack.
//!
//! A [`MiddlewareStack`] collects middleware and composes it around a
//! [`Kernel`] on demand. Every [`add`](MiddlewareStack::add) puts the new
//! middleware in front of the ones already registered, so the most recently
//! added layer is the outermost one: it runs first and may short-circuit
//! everything added before it.
//!
//! ```text
//! add(a); add(b); add(c);
//!
//! request → c → b → a → kernel
//!                          ↓
//! response ← c ← b ← a ←───┘
//! ```
//!
//! The outermost-first layer list is compiled on the first
//! [`call_stack`](MiddlewareStack::call_stack) and reused by later calls; an
//! `add` afterwards discards it so the next call picks up the new layer.

use crate::middleware::{Kernel, Middleware, Next};
use daedalus_core::{DispatchResult, Request, Response};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// A type-erased middleware that can be shared between stacks.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// An ordered middleware stack, outermost layer first.
#[derive(Default)]
pub struct MiddlewareStack {
    /// Front is the outermost layer.
    layers: VecDeque<BoxedMiddleware>,
    /// Layers frozen for execution, outermost first.
    compiled: OnceLock<Arc<[BoxedMiddleware]>>,
}

impl MiddlewareStack {
    /// Creates an empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a middleware as the new outermost layer.
    pub fn add<M: Middleware>(&mut self, middleware: M) -> &mut Self {
        self.add_boxed(Arc::new(middleware))
    }

    /// Adds a shared middleware as the new outermost layer.
    pub fn add_boxed(&mut self, middleware: BoxedMiddleware) -> &mut Self {
        tracing::trace!(middleware = middleware.name(), "middleware added to stack");
        self.layers.push_front(middleware);
        self.compiled = OnceLock::new();
        self
    }

    /// Runs the stack around `kernel`.
    ///
    /// The outermost layer receives `request` and `response`; whatever it
    /// returns is the result. Errors raised by any layer or by the kernel
    /// abort the remaining chain and are returned unchanged.
    pub async fn call_stack(
        &self,
        kernel: &dyn Kernel,
        request: Request,
        response: Response,
    ) -> DispatchResult<Response> {
        let layers = self.compiled.get_or_init(|| {
            tracing::debug!(layers = self.layers.len(), "building middleware chain");
            self.layers.iter().cloned().collect()
        });

        let mut next = Next::kernel(kernel);
        for middleware in layers.iter().rev() {
            next = Next::new(middleware.as_ref(), next);
        }

        next.run(request, response).await
    }

    /// Returns whether the chain has been compiled since the last `add`.
    #[must_use]
    pub fn is_built(&self) -> bool {
        self.compiled.get().is_some()
    }

    /// Returns the number of layers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Returns whether the stack has no layers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Returns layer names, outermost first.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.layers.iter().map(|m| m.name()).collect()
    }
}

impl fmt::Debug for MiddlewareStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareStack")
            .field("layers", &self.names())
            .field("built", &self.is_built())
            .finish()
    }
}
