//! # Daedalus
//!
//! **Request-dispatch core for a small HTTP routing framework**
//!
//! Given a matched route, Daedalus runs an ordered chain of middleware around
//! the route's handler and produces the response:
//!
//! - **Lazily built middleware chains**: the most recently added layer runs
//!   first, and group middleware wraps route middleware
//! - **Argument lifecycle**: every dispatch attempt starts from the saved
//!   baseline, so matched path arguments never leak into the next attempt
//! - **Output buffering**: stray handler output is captured and prepended or
//!   appended to the body, or streamed ahead of a [`NonBufferedBody`](core::NonBufferedBody)
//!
//! ## Quick Start
//!
//! ```rust
//! use daedalus::prelude::*;
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let api = RouteGroup::new("/api");
//! api.add(FnMiddleware::new("powered_by", |request, response, next| {
//!     Box::pin(async move {
//!         let mut response = next.run(request, response).await?;
//!         response
//!             .headers_mut()
//!             .insert("x-powered-by", http::HeaderValue::from_static("daedalus"));
//!         Ok(response)
//!     })
//! }));
//!
//! let show = FnHandler::new(|_request, _response, arguments| {
//!     Box::pin(async move { Ok(HandlerOutput::text(format!("article {}", arguments["id"]))) })
//! });
//!
//! let config = ConfigLoader::new().with_production().load().unwrap();
//! let mut route = Route::new(
//!     [http::Method::GET],
//!     "/api/articles/{id}",
//!     CallableRef::handler(show),
//!     &[Arc::clone(&api)],
//!     0,
//! );
//! config.routes.apply_to(&mut route).unwrap();
//!
//! let request = http::Request::builder().uri("/api/articles/12").body(bytes::Bytes::new()).unwrap();
//! route.prepare(&request, [("id", "12")]);
//! let response = route.run(request, Response::empty()).await.unwrap();
//!
//! assert_eq!(response.body_bytes(), "article 12");
//! assert_eq!(response.headers()["x-powered-by"], "daedalus");
//! # });
//! ```
//!
//! ## Architecture
//!
//! ```text
//! prepare(request, matched) → run → g1 → g2 → r1 → Route::invoke → strategy → handler
//!                                                                              ↓
//! response ←──────────────── g1 ← g2 ← r1 ← output capture applied ←─────────┘
//! ```

#![doc(html_root_url = "https://docs.rs/daedalus/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export core types
pub use daedalus_core as core;

// Re-export middleware types
pub use daedalus_middleware as middleware;

// Re-export route types
pub use daedalus_route as route;

// Re-export logging setup
pub use daedalus_telemetry as telemetry;

// Re-export configuration
pub use daedalus_config as config;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use daedalus_core::{
        Arguments, BodyStream, BufferedBody, CallableRef, CallableResolver, DispatchError,
        DispatchResult, FnHandler, Handler, HandlerOutput, HandlerRegistry, InvocationStrategy,
        NonBufferedBody, OutputBufferStack, Request, RequestResponse, Response, ResponseExt,
        RouteArguments,
    };

    pub use daedalus_middleware::{
        DeferredMiddleware, FnMiddleware, Middleware, MiddlewareRegistry, MiddlewareStack, Next,
    };

    pub use daedalus_route::{OutputBuffering, Route, RouteGroup};

    pub use daedalus_config::{ConfigLoader, DaedalusConfig};

    pub use daedalus_telemetry::{init_logging, LogConfig};
}
