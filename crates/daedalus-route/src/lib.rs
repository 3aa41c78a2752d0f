//! # Daedalus Route
//!
//! Route orchestration for the Daedalus route dispatch core.
//!
//! A [`Route`] owns everything needed to dispatch one matched request:
//!
//! - its HTTP methods, identifier and optional name,
//! - the callable, resolved lazily through a
//!   [`CallableResolver`](daedalus_core::CallableResolver),
//! - saved and transient arguments, reset by [`Route::prepare`],
//! - its own middleware plus the middleware inherited from its
//!   [`RouteGroup`]s, merged once by [`Route::finalize`],
//! - an [`OutputBuffering`] mode deciding where captured output goes.
//!
//! ## Example
//!
//! ```
//! use daedalus_core::{CallableRef, FnHandler, HandlerOutput, Response, ResponseExt};
//! use daedalus_middleware::FnMiddleware;
//! use daedalus_route::{Route, RouteGroup};
//! use http::Method;
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let api = RouteGroup::new("/api");
//! api.add(FnMiddleware::new("api", |request, response, next| {
//!     Box::pin(async move { next.run(request, response).await })
//! }));
//!
//! let handler = FnHandler::new(|_req, _res, _args| Box::pin(async { Ok(HandlerOutput::text("pong")) }));
//! let mut route = Route::new([Method::GET], "/api/ping", CallableRef::handler(handler), &[Arc::clone(&api)], 0);
//!
//! let request = http::Request::builder().uri("/api/ping").body(bytes::Bytes::new()).unwrap();
//! route.prepare(&request, std::iter::empty::<(String, String)>());
//! let response = route.run(request, Response::empty()).await.unwrap();
//!
//! assert_eq!(response.body_bytes(), "pong");
//! assert_eq!(route.middleware_stack().names(), vec!["api"]);
//! # });
//! ```

#![doc(html_root_url = "https://docs.rs/daedalus-route/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod buffering;
mod group;
mod routable;
mod route;

pub use buffering::OutputBuffering;
pub use group::RouteGroup;
pub use routable::Routable;
pub use route::Route;
