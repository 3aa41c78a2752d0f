//! Core middleware trait and types.
//!
//! This module defines the [`Middleware`] trait, the [`Next`] continuation a
//! middleware uses to reach the inner layers, and the [`Kernel`] that sits at
//! the center of every chain.
//!
//! # Example
//!
//! ```
//! use daedalus_core::{DispatchResult, Request, Response, ResponseExt};
//! use daedalus_middleware::{BoxFuture, Kernel, Middleware, MiddlewareStack, Next};
//! use http::HeaderValue;
//!
//! struct PoweredBy;
//!
//! impl Middleware for PoweredBy {
//!     fn name(&self) -> &str {
//!         "powered_by"
//!     }
//!
//!     fn process<'a>(
//!         &'a self,
//!         request: Request,
//!         response: Response,
//!         next: Next<'a>,
//!     ) -> BoxFuture<'a, DispatchResult<Response>> {
//!         Box::pin(async move {
//!             let mut response = next.run(request, response).await?;
//!             response
//!                 .headers_mut()
//!                 .insert("x-powered-by", HeaderValue::from_static("daedalus"));
//!             Ok(response)
//!         })
//!     }
//! }
//!
//! struct Passthrough;
//!
//! impl Kernel for Passthrough {
//!     fn call<'a>(
//!         &'a self,
//!         _request: Request,
//!         response: Response,
//!     ) -> BoxFuture<'a, DispatchResult<Response>> {
//!         Box::pin(async move { Ok(response) })
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let mut stack = MiddlewareStack::new();
//! stack.add(PoweredBy);
//!
//! let request = http::Request::new(bytes::Bytes::new());
//! let response = stack
//!     .call_stack(&Passthrough, request, Response::empty())
//!     .await
//!     .unwrap();
//! assert_eq!(response.headers()["x-powered-by"], "daedalus");
//! # });
//! ```

use daedalus_core::{BoxFuture, DispatchResult, Request, Response};
use std::fmt;

/// A request-processing layer wrapped around a route.
///
/// A middleware receives the request, the working response and a [`Next`]
/// continuation. It may:
///
/// - call `next.run(request, response)` and return or transform the result,
/// - return its own response without calling `next` (short-circuit),
/// - return an error, which aborts the remaining chain and propagates up.
pub trait Middleware: Send + Sync + 'static {
    /// Returns the name of this middleware, used for logging and debugging.
    fn name(&self) -> &str;

    /// Processes the request through this layer.
    fn process<'a>(
        &'a self,
        request: Request,
        response: Response,
        next: Next<'a>,
    ) -> BoxFuture<'a, DispatchResult<Response>>;
}

/// The terminal action at the center of a middleware chain.
///
/// For routes this is the route itself: invoking the kernel invokes the
/// route's handler.
pub trait Kernel: Send + Sync {
    /// Runs the terminal action.
    fn call<'a>(
        &'a self,
        request: Request,
        response: Response,
    ) -> BoxFuture<'a, DispatchResult<Response>>;
}

/// Continuation to the inner layers of the chain.
///
/// Consumed by [`Next::run`], so a middleware can delegate at most once.
pub struct Next<'a> {
    inner: NextInner<'a>,
}

enum NextInner<'a> {
    /// More middleware to process
    Chain {
        middleware: &'a dyn Middleware,
        next: Box<Next<'a>>,
    },
    /// End of chain
    Kernel(&'a dyn Kernel),
}

impl<'a> Next<'a> {
    /// Creates a `Next` that will invoke `middleware`, then `next`.
    pub(crate) fn new(middleware: &'a dyn Middleware, next: Next<'a>) -> Self {
        Self {
            inner: NextInner::Chain {
                middleware,
                next: Box::new(next),
            },
        }
    }

    /// Creates a terminal `Next` that invokes the kernel.
    pub(crate) fn kernel(kernel: &'a dyn Kernel) -> Self {
        Self {
            inner: NextInner::Kernel(kernel),
        }
    }

    /// Invokes the next middleware, or the kernel at the end of the chain.
    pub async fn run(self, request: Request, response: Response) -> DispatchResult<Response> {
        match self.inner {
            NextInner::Chain { middleware, next } => {
                tracing::trace!(middleware = middleware.name(), "entering middleware");
                middleware.process(request, response, *next).await
            }
            NextInner::Kernel(kernel) => kernel.call(request, response).await,
        }
    }
}

impl fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            NextInner::Chain { middleware, .. } => {
                f.debug_tuple("Next").field(&middleware.name()).finish()
            }
            NextInner::Kernel(_) => f.write_str("Next(kernel)"),
        }
    }
}

/// A middleware built from a closure.
///
/// # Example
///
/// ```
/// use daedalus_middleware::FnMiddleware;
///
/// let timing = FnMiddleware::new("timing", |request, response, next| {
///     Box::pin(async move {
///         let started = std::time::Instant::now();
///         let response = next.run(request, response).await;
///         tracing::debug!(elapsed = ?started.elapsed(), "request handled");
///         response
///     })
/// });
/// ```
pub struct FnMiddleware<F> {
    name: String,
    func: F,
}

impl<F> FnMiddleware<F>
where
    F: for<'a> Fn(Request, Response, Next<'a>) -> BoxFuture<'a, DispatchResult<Response>>
        + Send
        + Sync
        + 'static,
{
    /// Creates a new closure-based middleware.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Middleware for FnMiddleware<F>
where
    F: for<'a> Fn(Request, Response, Next<'a>) -> BoxFuture<'a, DispatchResult<Response>>
        + Send
        + Sync
        + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn process<'a>(
        &'a self,
        request: Request,
        response: Response,
        next: Next<'a>,
    ) -> BoxFuture<'a, DispatchResult<Response>> {
        (self.func)(request, response, next)
    }
}

impl<F> fmt::Debug for FnMiddleware<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnMiddleware")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
