//! # Daedalus Core
//!
//! Core types and traits for the Daedalus route dispatch core.
//!
//! This crate provides the foundational types shared by the middleware chain
//! and the route orchestrator:
//!
//! - [`DispatchError`] - Standard error type for dispatch failures
//! - [`BodyStream`] - Byte-stream capability contract for response bodies
//! - [`BufferedBody`] - In-memory, seekable response body
//! - [`NonBufferedBody`] - Write-only body that pushes bytes to the client immediately
//! - [`OutputBufferStack`] - Explicit ambient output-buffer stack
//! - [`Handler`] - Route handler trait and [`HandlerOutput`] result variant
//! - [`InvocationStrategy`] - How a handler is called with the route arguments
//! - [`CallableRef`] / [`CallableResolver`] - Lazy handler identifiers and their lookup

#![doc(html_root_url = "https://docs.rs/daedalus-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod body;
mod error;
mod handler;
pub mod invocation;
mod non_buffered;
pub mod output;
pub mod resolver;
mod types;

pub use body::{BodyStream, BufferedBody};
pub use error::{DispatchError, DispatchResult, ErrorCategory, ErrorDetail, ErrorEnvelope};
pub use handler::{FnHandler, Handler, HandlerOutput};
pub use invocation::{InvocationStrategy, RequestResponse, RouteArguments};
pub use non_buffered::NonBufferedBody;
pub use output::{LevelToken, MemorySink, OutputBufferStack, OutputBuffers};
pub use resolver::{CallableRef, CallableResolver, HandlerRegistry};
pub use types::{Arguments, Body, BoxFuture, Request, Response, ResponseExt};
