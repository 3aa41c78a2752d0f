//! Handler trait for route callables.
//!
//! A [`Handler`] is what a route ultimately invokes. It receives the request,
//! the working response and the route arguments, and answers with a
//! [`HandlerOutput`] saying what should become of the response.

use crate::error::DispatchResult;
use crate::types::{Arguments, BoxFuture, Request, Response};
use std::fmt;

/// What a handler produced.
pub enum HandlerOutput {
    /// A complete response that replaces the working response.
    Response(Response),
    /// Text appended to the working response body, when it is writable.
    Text(String),
    /// Nothing to apply; the working response is kept as the handler left it.
    Ignored,
}

impl HandlerOutput {
    /// Creates a text output.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }
}

impl fmt::Debug for HandlerOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Response(response) => f
                .debug_tuple("Response")
                .field(&response.status())
                .finish(),
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Ignored => f.write_str("Ignored"),
        }
    }
}

impl From<Response> for HandlerOutput {
    fn from(response: Response) -> Self {
        Self::Response(response)
    }
}

impl From<String> for HandlerOutput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for HandlerOutput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<()> for HandlerOutput {
    fn from((): ()) -> Self {
        Self::Ignored
    }
}

/// A route callable.
///
/// The handler may mutate the working response in place (status, headers,
/// body writes) and return [`HandlerOutput::Ignored`], return text to append,
/// or return a whole new response.
///
/// # Example
///
/// ```
/// use daedalus_core::{Arguments, BoxFuture, DispatchResult, Handler, HandlerOutput, Request, Response};
///
/// struct Hello;
///
/// impl Handler for Hello {
///     fn call<'a>(
///         &'a self,
///         _request: Request,
///         _response: &'a mut Response,
///         arguments: &'a Arguments,
///     ) -> BoxFuture<'a, DispatchResult<HandlerOutput>> {
///         Box::pin(async move {
///             let name = arguments.get("name").map_or("world", String::as_str);
///             Ok(HandlerOutput::text(format!("Hello, {name}!")))
///         })
///     }
/// }
///
/// # tokio_test::block_on(async {
/// let mut arguments = Arguments::new();
/// arguments.insert("name".to_string(), "Daedalus".to_string());
/// let mut response = daedalus_core::Response::new(Box::new(daedalus_core::BufferedBody::new()));
/// let request = http::Request::new(bytes::Bytes::new());
///
/// let output = Hello.call(request, &mut response, &arguments).await.unwrap();
/// assert!(matches!(output, HandlerOutput::Text(text) if text == "Hello, Daedalus!"));
/// # });
/// ```
pub trait Handler: Send + Sync + 'static {
    /// Handles the request.
    fn call<'a>(
        &'a self,
        request: Request,
        response: &'a mut Response,
        arguments: &'a Arguments,
    ) -> BoxFuture<'a, DispatchResult<HandlerOutput>>;
}

/// A closure-based handler.
///
/// # Example
///
/// ```
/// use daedalus_core::{FnHandler, HandlerOutput};
///
/// let handler = FnHandler::new(|_request, _response, arguments| {
///     Box::pin(async move {
///         Ok(HandlerOutput::text(format!("user {}", arguments["id"])))
///     })
/// });
/// ```
pub struct FnHandler<F> {
    func: F,
}

impl<F> FnHandler<F>
where
    F: for<'a> Fn(
            Request,
            &'a mut Response,
            &'a Arguments,
        ) -> BoxFuture<'a, DispatchResult<HandlerOutput>>
        + Send
        + Sync
        + 'static,
{
    /// Creates a new closure-based handler.
    pub const fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> Handler for FnHandler<F>
where
    F: for<'a> Fn(
            Request,
            &'a mut Response,
            &'a Arguments,
        ) -> BoxFuture<'a, DispatchResult<HandlerOutput>>
        + Send
        + Sync
        + 'static,
{
    fn call<'a>(
        &'a self,
        request: Request,
        response: &'a mut Response,
        arguments: &'a Arguments,
    ) -> BoxFuture<'a, DispatchResult<HandlerOutput>> {
        (self.func)(request, response, arguments)
    }
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").finish_non_exhaustive()
    }
}
