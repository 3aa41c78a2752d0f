//! Handler invocation strategies.
//!
//! An [`InvocationStrategy`] decides how a route hands its arguments to the
//! resolved handler. Routes use [`RequestResponse`] unless a strategy is set
//! explicitly.

use crate::error::DispatchResult;
use crate::handler::{Handler, HandlerOutput};
use crate::types::{Arguments, BoxFuture, Request, Response};

/// Invokes a handler for a route.
pub trait InvocationStrategy: Send + Sync + 'static {
    /// Calls `handler` with the request, the working response and the route
    /// arguments, and returns what it produced.
    fn invoke<'a>(
        &'a self,
        handler: &'a dyn Handler,
        request: Request,
        response: &'a mut Response,
        arguments: &'a Arguments,
    ) -> BoxFuture<'a, DispatchResult<HandlerOutput>>;
}

/// Route arguments attached to the request as an extension.
///
/// Handlers and strategies that only see the request can still read the
/// arguments of the route that matched it.
///
/// # Example
///
/// ```
/// use daedalus_core::{Arguments, RouteArguments};
///
/// let mut arguments = Arguments::new();
/// arguments.insert("id".to_string(), "42".to_string());
///
/// let route_arguments = RouteArguments::new(arguments);
/// assert_eq!(route_arguments.get("id"), Some("42"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteArguments(Arguments);

impl RouteArguments {
    /// Wraps route arguments.
    #[must_use]
    pub fn new(arguments: Arguments) -> Self {
        Self(arguments)
    }

    /// Returns the value of an argument.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Returns all arguments.
    #[must_use]
    pub fn as_map(&self) -> &Arguments {
        &self.0
    }
}

/// Default strategy: copy the arguments onto the request, then call the
/// handler with request, response and arguments.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestResponse;

impl InvocationStrategy for RequestResponse {
    fn invoke<'a>(
        &'a self,
        handler: &'a dyn Handler,
        mut request: Request,
        response: &'a mut Response,
        arguments: &'a Arguments,
    ) -> BoxFuture<'a, DispatchResult<HandlerOutput>> {
        request
            .extensions_mut()
            .insert(RouteArguments::new(arguments.clone()));
        handler.call(request, response, arguments)
    }
}
