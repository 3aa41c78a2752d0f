//! # Daedalus Middleware
//!
//! The middleware chain of the Daedalus route dispatch core.
//!
//! Middleware wraps a [`Kernel`] (for routes, the route itself). Layers are
//! added to a [`MiddlewareStack`] one at a time and every new layer becomes
//! the outermost one, so the most recently added middleware sees the request
//! first and the response last.
//!
//! ## Example
//!
//! ```
//! use daedalus_middleware::{FnMiddleware, MiddlewareStack};
//!
//! let mut stack = MiddlewareStack::new();
//! stack.add(FnMiddleware::new("inner", |request, response, next| {
//!     Box::pin(async move { next.run(request, response).await })
//! }));
//! stack.add(FnMiddleware::new("outer", |request, response, next| {
//!     Box::pin(async move { next.run(request, response).await })
//! }));
//!
//! assert_eq!(stack.names(), vec!["outer", "inner"]);
//! ```
//!
//! Middleware known only by name is wrapped in a [`DeferredMiddleware`] and
//! looked up through a [`MiddlewareResolver`] when first reached.

#![doc(html_root_url = "https://docs.rs/daedalus-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod deferred;
mod middleware;
mod stack;

pub use daedalus_core::BoxFuture;
pub use deferred::{DeferredMiddleware, MiddlewareRegistry, MiddlewareResolver};
pub use middleware::{FnMiddleware, Kernel, Middleware, Next};
pub use stack::{BoxedMiddleware, MiddlewareStack};
