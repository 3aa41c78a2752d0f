//! The route orchestrator.
//!
//! A [`Route`] ties a callable to its methods, arguments and middleware.
//! Dispatching a route is two calls:
//!
//! 1. [`Route::prepare`] resets the transient arguments to the saved
//!    baseline and applies the arguments matched from the path.
//! 2. [`Route::run`] finalizes the middleware chain on first use and walks
//!    it; the route itself sits at the center and invokes the handler.
//!
//! ```text
//!            ┌──────────── g1 ────────────┐
//!            │  ┌───────── g2 ─────────┐  │
//! request ──►│  │  ┌────── r1 ──────┐  │  │
//!            │  │  │ Route::invoke  │  │  │
//!            │  │  └────────────────┘  │  │
//!            │  └──────────────────────┘  │
//!            └────────────────────────────┘
//! ```

use crate::buffering::OutputBuffering;
use crate::group::RouteGroup;
use crate::routable::Routable;
use bytes::{Bytes, BytesMut};
use daedalus_core::{
    Arguments, BoxFuture, BufferedBody, CallableRef, CallableResolver, DispatchError,
    DispatchResult, HandlerOutput, InvocationStrategy, LevelToken, OutputBufferStack, Request,
    RequestResponse, Response,
};
use daedalus_middleware::{BoxedMiddleware, Kernel, Middleware, MiddlewareStack};
use http::Method;
use indexmap::IndexSet;
use std::fmt;
use std::sync::{Arc, Weak};

/// A dispatchable route.
///
/// # Example
///
/// ```
/// use daedalus_core::{CallableRef, FnHandler, HandlerOutput, Response, ResponseExt};
/// use daedalus_route::Route;
/// use http::Method;
///
/// # tokio_test::block_on(async {
/// let handler = FnHandler::new(|_request, _response, arguments| {
///     Box::pin(async move { Ok(HandlerOutput::text(format!("article {}", arguments["id"]))) })
/// });
///
/// let mut route = Route::new([Method::GET], "/articles/{id}", CallableRef::handler(handler), &[], 0);
/// let request = http::Request::builder().uri("/articles/7").body(bytes::Bytes::new()).unwrap();
/// route.prepare(&request, [("id", "7")]);
///
/// let response = route.run(request, Response::empty()).await.unwrap();
/// assert_eq!(response.body_bytes(), "article 7");
/// # });
/// ```
pub struct Route {
    routable: Routable,
    methods: IndexSet<Method>,
    identifier: String,
    name: Option<String>,
    groups: Vec<Weak<RouteGroup>>,
    finalized: bool,
    output_buffering: OutputBuffering,
    arguments: Arguments,
    saved_arguments: Arguments,
    strategy: Option<Arc<dyn InvocationStrategy>>,
    output: Option<Arc<OutputBufferStack>>,
    stack: MiddlewareStack,
}

impl Route {
    /// Creates a route.
    ///
    /// `groups` are the enclosing groups, outermost first. `identifier` is
    /// the sequence number assigned by the routing table; the route is known
    /// as `route{identifier}`.
    pub fn new(
        methods: impl IntoIterator<Item = Method>,
        pattern: impl Into<String>,
        callable: impl Into<CallableRef>,
        groups: &[Arc<RouteGroup>],
        identifier: u64,
    ) -> Self {
        Self {
            routable: Routable::new(pattern, callable),
            methods: methods.into_iter().collect(),
            identifier: format!("route{identifier}"),
            name: None,
            groups: groups.iter().map(Arc::downgrade).collect(),
            finalized: false,
            output_buffering: OutputBuffering::default(),
            arguments: Arguments::new(),
            saved_arguments: Arguments::new(),
            strategy: None,
            output: None,
            stack: MiddlewareStack::new(),
        }
    }

    // ------------------------------------------------------------------
    // Metadata
    // ------------------------------------------------------------------

    /// Returns the HTTP methods, in declaration order.
    #[must_use]
    pub fn methods(&self) -> &IndexSet<Method> {
        &self.methods
    }

    /// Returns the URL pattern.
    #[must_use]
    pub fn pattern(&self) -> &str {
        self.routable.pattern()
    }

    /// Returns the dispatch identifier, e.g. `route3`.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Returns the route name.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Sets the route name.
    pub fn set_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the route name from a dynamically typed value.
    ///
    /// Anything but a string is rejected and the current name is kept.
    pub fn set_name_value(&mut self, name: &serde_json::Value) -> DispatchResult<&mut Self> {
        match name {
            serde_json::Value::String(name) => Ok(self.set_name(name.as_str())),
            other => Err(DispatchError::invalid_argument(format!(
                "Route name must be a string, got {other}"
            ))),
        }
    }

    /// Returns the groups that are still alive, outermost first.
    #[must_use]
    pub fn groups(&self) -> Vec<Arc<RouteGroup>> {
        self.groups.iter().filter_map(Weak::upgrade).collect()
    }

    /// Returns the callable reference.
    #[must_use]
    pub fn callable(&self) -> CallableRef {
        self.routable.callable()
    }

    /// Replaces the callable.
    pub fn set_callable(&mut self, callable: impl Into<CallableRef>) -> &mut Self {
        self.routable.set_callable(callable);
        self
    }

    /// Sets the resolver used for callable identifiers.
    pub fn set_resolver(&mut self, resolver: Arc<dyn CallableResolver>) -> &mut Self {
        self.routable.set_resolver(resolver);
        self
    }

    /// Sets the strategy used to invoke the handler.
    ///
    /// Without one, [`RequestResponse`] is used.
    pub fn set_strategy(&mut self, strategy: Arc<dyn InvocationStrategy>) -> &mut Self {
        self.strategy = Some(strategy);
        self
    }

    /// Attaches the fallback output buffer stack handlers write stray output to.
    ///
    /// A stack carried by the request as an `Arc<OutputBufferStack>`
    /// extension takes precedence, which is how concurrent dispatches keep
    /// their output apart. Otherwise this stack is inserted into the request
    /// for the handler.
    pub fn set_output_stack(&mut self, output: Arc<OutputBufferStack>) -> &mut Self {
        self.output = Some(output);
        self
    }

    /// Returns the output buffering mode.
    #[must_use]
    pub fn output_buffering(&self) -> OutputBuffering {
        self.output_buffering
    }

    /// Sets the output buffering mode.
    ///
    /// Accepts an [`OutputBuffering`] or anything convertible to one: `false`,
    /// `"prepend"`, `"append"`, or a JSON value holding one of those. Any
    /// other value is rejected and the current mode is kept.
    ///
    /// # Example
    ///
    /// ```
    /// use daedalus_core::CallableRef;
    /// use daedalus_route::{OutputBuffering, Route};
    ///
    /// let mut route = Route::new([http::Method::GET], "/", CallableRef::from("home"), &[], 0);
    /// route.set_output_buffering("prepend").unwrap();
    /// assert!(route.set_output_buffering("bogus").is_err());
    /// assert_eq!(route.output_buffering(), OutputBuffering::Prepend);
    /// ```
    pub fn set_output_buffering<M>(&mut self, mode: M) -> DispatchResult<&mut Self>
    where
        M: TryInto<OutputBuffering>,
        DispatchError: From<M::Error>,
    {
        self.output_buffering = mode.try_into()?;
        Ok(self)
    }

    /// Returns whether the middleware chain has been finalized.
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Returns the middleware stack.
    #[must_use]
    pub fn middleware_stack(&self) -> &MiddlewareStack {
        &self.stack
    }

    // ------------------------------------------------------------------
    // Arguments
    // ------------------------------------------------------------------

    /// Sets one argument; with `include_in_saved` it also becomes part of the
    /// baseline restored by [`prepare`](Self::prepare).
    pub fn set_argument(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
        include_in_saved: bool,
    ) -> &mut Self {
        let name = name.into();
        let value = value.into();
        if include_in_saved {
            self.saved_arguments.insert(name.clone(), value.clone());
        }
        self.arguments.insert(name, value);
        self
    }

    /// Replaces all arguments; with `include_in_saved` the baseline is
    /// replaced too.
    pub fn set_arguments(&mut self, arguments: Arguments, include_in_saved: bool) -> &mut Self {
        if include_in_saved {
            self.saved_arguments = arguments.clone();
        }
        self.arguments = arguments;
        self
    }

    /// Returns an argument of the in-flight dispatch.
    #[must_use]
    pub fn argument(&self, name: &str) -> Option<&str> {
        self.arguments.get(name).map(String::as_str)
    }

    /// Returns an argument, or `default` when it is absent.
    #[must_use]
    pub fn argument_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.argument(name).unwrap_or(default)
    }

    /// Returns the arguments of the in-flight dispatch.
    #[must_use]
    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    /// Returns the saved baseline.
    #[must_use]
    pub fn saved_arguments(&self) -> &Arguments {
        &self.saved_arguments
    }

    /// Prepares the route for a dispatch attempt.
    ///
    /// Arguments are reset to the saved baseline, then `matched` is applied on
    /// top. Matched arguments are never saved, so nothing from an earlier
    /// attempt leaks into this one.
    pub fn prepare<I, K, V>(&mut self, request: &Request, matched: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.arguments.clone_from(&self.saved_arguments);
        for (name, value) in matched {
            self.arguments.insert(name.into(), value.into());
        }

        tracing::debug!(
            route = %self.identifier,
            method = %request.method(),
            uri = %request.uri(),
            arguments = ?self.arguments,
            "route prepared"
        );
    }

    // ------------------------------------------------------------------
    // Middleware
    // ------------------------------------------------------------------

    /// Adds a middleware to this route.
    ///
    /// Before the route is finalized the middleware joins the pending list;
    /// afterwards it goes straight onto the stack as the outermost layer.
    pub fn add<M: Middleware>(&mut self, middleware: M) -> &mut Self {
        self.add_boxed(Arc::new(middleware))
    }

    /// Adds a shared middleware to this route.
    pub fn add_boxed(&mut self, middleware: BoxedMiddleware) -> &mut Self {
        if self.finalized {
            self.stack.add_boxed(middleware);
        } else {
            self.routable.add_boxed(middleware);
        }
        self
    }

    /// Merges group middleware into the route and fills the stack.
    ///
    /// Group lists are merged outermost group first, each placed ahead of the
    /// ones merged before it, and appended after the route's own middleware.
    /// Every entry is then added to the stack in that order, so for groups
    /// `[g1, g2]` and route middleware `[r1]` the chain runs `g1, g2, r1`.
    /// Runs once; later calls do nothing.
    pub fn finalize(&mut self) {
        if self.finalized {
            return;
        }

        let mut group_middleware: Vec<BoxedMiddleware> = Vec::new();
        for group in &self.groups {
            match group.upgrade() {
                Some(group) => {
                    let mut merged = group.middleware();
                    merged.append(&mut group_middleware);
                    group_middleware = merged;
                }
                None => tracing::warn!(
                    route = %self.identifier,
                    "route group dropped before finalize, skipping its middleware"
                ),
            }
        }

        let mut merged = self.routable.middleware().to_vec();
        merged.extend(group_middleware);
        for middleware in &merged {
            self.stack.add_boxed(Arc::clone(middleware));
        }
        self.routable.replace_middleware(merged);
        self.finalized = true;

        tracing::debug!(
            route = %self.identifier,
            chain = ?self.stack.names(),
            "route finalized"
        );
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    /// Runs the route: finalizes it if needed, then walks the middleware
    /// chain with this route at its center.
    pub async fn run(&mut self, request: Request, response: Response) -> DispatchResult<Response> {
        self.finalize();
        let route: &Self = self;
        route.stack.call_stack(route, request, response).await
    }

    /// Invokes the handler; this is the innermost step of the chain.
    ///
    /// The handler output is applied to the working response: a response
    /// replaces it, text is written to its body when the body is writable,
    /// and anything else leaves it as the handler left it. When an output
    /// stack is attached and buffering is enabled, output the handler emits
    /// through it is captured and combined with the body as well.
    pub async fn invoke(
        &self,
        mut request: Request,
        mut response: Response,
    ) -> DispatchResult<Response> {
        let handler = self.routable.resolve_callable()?;
        let strategy: &dyn InvocationStrategy = match &self.strategy {
            Some(strategy) => strategy.as_ref(),
            None => &RequestResponse,
        };

        let output = match request.extensions().get::<Arc<OutputBufferStack>>() {
            Some(output) => Some(Arc::clone(output)),
            None => self.output.clone(),
        };
        if let Some(output) = &output {
            request.extensions_mut().insert(Arc::clone(output));
        }
        let capture = output
            .as_deref()
            .filter(|_| self.output_buffering.is_enabled())
            .map(OutputCapture::open);

        let result = strategy
            .invoke(handler.as_ref(), request, &mut response, &self.arguments)
            .await;
        let captured = capture.and_then(OutputCapture::close);

        match result? {
            HandlerOutput::Response(replacement) => response = replacement,
            HandlerOutput::Text(text) => {
                if response.body().is_writable() {
                    response.body_mut().write(text.as_bytes())?;
                }
            }
            HandlerOutput::Ignored => {}
        }

        if let Some(captured) = captured {
            if response.body().is_writable() {
                self.apply_captured(&mut response, &captured)?;
            }
        }

        Ok(response)
    }

    fn apply_captured(&self, response: &mut Response, captured: &Bytes) -> DispatchResult<()> {
        tracing::trace!(
            route = %self.identifier,
            mode = %self.output_buffering,
            bytes = captured.len(),
            "applying captured output"
        );
        match self.output_buffering {
            OutputBuffering::Prepend => {
                let existing = response.body().to_bytes();
                let mut combined = BytesMut::with_capacity(captured.len() + existing.len());
                combined.extend_from_slice(captured);
                combined.extend_from_slice(&existing);
                *response.body_mut() = Box::new(BufferedBody::with_content(combined.freeze()));
            }
            OutputBuffering::Append => {
                response.body_mut().write(captured)?;
            }
            OutputBuffering::Disabled => {}
        }
        Ok(())
    }
}

impl Kernel for Route {
    fn call<'a>(
        &'a self,
        request: Request,
        response: Response,
    ) -> BoxFuture<'a, DispatchResult<Response>> {
        Box::pin(self.invoke(request, response))
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("identifier", &self.identifier)
            .field("name", &self.name)
            .field("methods", &self.methods)
            .field("routable", &self.routable)
            .field("finalized", &self.finalized)
            .field("output_buffering", &self.output_buffering)
            .field("arguments", &self.arguments)
            .finish_non_exhaustive()
    }
}

/// An output buffer level opened around a handler call.
///
/// Dropping the capture without closing it discards what it holds, so a
/// failed or cancelled handler leaves the stack as it found it.
struct OutputCapture<'a> {
    output: &'a OutputBufferStack,
    token: Option<LevelToken>,
}

impl<'a> OutputCapture<'a> {
    fn open(output: &'a OutputBufferStack) -> Self {
        Self {
            output,
            token: Some(output.start_owned()),
        }
    }

    /// Closes the level and returns its content, if any.
    fn close(mut self) -> Option<Bytes> {
        self.take().filter(|captured| !captured.is_empty())
    }

    fn take(&mut self) -> Option<Bytes> {
        // A non-buffered body may already have drained the level.
        self.token
            .take()
            .and_then(|token| self.output.end_owned(token))
    }
}

impl Drop for OutputCapture<'_> {
    fn drop(&mut self) {
        let _ = self.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use daedalus_core::{
        BodyStream, ErrorCategory, FnHandler, Handler, HandlerRegistry, MemorySink, NonBufferedBody,
        ResponseExt, RouteArguments,
    };
    use daedalus_middleware::FnMiddleware;
    use http::StatusCode;
    use parking_lot::Mutex;
    use serde_json::json;

    type Trail = Arc<Mutex<Vec<String>>>;

    fn request() -> Request {
        http::Request::builder()
            .uri("/articles/1")
            .body(Bytes::new())
            .unwrap()
    }

    fn text_handler(text: &'static str) -> impl Handler {
        FnHandler::new(move |_req, _res, _args| {
            Box::pin(async move { Ok(HandlerOutput::text(text)) })
        })
    }

    fn route_with(handler: impl Handler, groups: &[Arc<RouteGroup>]) -> Route {
        Route::new(
            [Method::GET],
            "/articles/{id}",
            CallableRef::handler(handler),
            groups,
            1,
        )
    }

    fn recording(name: &'static str, trail: &Trail) -> impl Middleware {
        let trail = trail.clone();
        FnMiddleware::new(name, move |request, response, next| {
            trail.lock().push(name.to_string());
            Box::pin(async move { next.run(request, response).await })
        })
    }

    fn echoing(text: &'static str) -> impl Handler {
        FnHandler::new(move |req, _res, _args| {
            Box::pin(async move {
                if let Some(output) = req.extensions().get::<Arc<OutputBufferStack>>() {
                    output.echo(text.as_bytes())?;
                }
                Ok(HandlerOutput::Ignored)
            })
        })
    }

    #[test]
    fn test_metadata() {
        let route = Route::new(
            [Method::GET, Method::HEAD, Method::GET],
            "/articles/{id}",
            "articles:show",
            &[],
            7,
        );
        assert_eq!(route.identifier(), "route7");
        assert_eq!(route.pattern(), "/articles/{id}");
        assert_eq!(
            route.methods().iter().collect::<Vec<_>>(),
            vec![&Method::GET, &Method::HEAD]
        );
        assert_eq!(route.name(), None);
        assert_eq!(route.output_buffering(), OutputBuffering::Append);
        assert!(!route.is_finalized());
        assert!(format!("{route:?}").contains("route7"));
    }

    #[test]
    fn test_set_name_value_rejects_non_strings() {
        let mut route = route_with(text_handler(""), &[]);
        route.set_name_value(&json!("articles.show")).unwrap();
        assert_eq!(route.name(), Some("articles.show"));

        let err = route.set_name_value(&json!(42)).err().unwrap();
        assert_eq!(err.category(), ErrorCategory::InvalidArgument);
        assert_eq!(route.name(), Some("articles.show"));
    }

    #[test]
    fn test_invalid_buffering_mode_keeps_previous() {
        let mut route = route_with(text_handler(""), &[]);
        route.set_output_buffering(false).unwrap();
        assert_eq!(route.output_buffering(), OutputBuffering::Disabled);

        let err = route.set_output_buffering("bogus").err().unwrap();
        assert_eq!(err.category(), ErrorCategory::InvalidArgument);
        assert_eq!(route.output_buffering(), OutputBuffering::Disabled);

        assert!(route.set_output_buffering(true).is_err());
        assert!(route.set_output_buffering(&json!(3)).is_err());
        route.set_output_buffering(OutputBuffering::Prepend).unwrap();
        assert_eq!(route.output_buffering(), OutputBuffering::Prepend);
    }

    #[test]
    fn test_argument_reset_on_prepare() {
        let mut route = route_with(text_handler(""), &[]);
        route.set_argument("id", "5", true);
        route.set_argument("tmp", "x", false);
        assert_eq!(route.argument("tmp"), Some("x"));

        route.prepare(&request(), std::iter::empty::<(String, String)>());
        assert_eq!(route.argument("tmp"), None);
        assert_eq!(route.argument_or("tmp", "fallback"), "fallback");
        assert_eq!(route.argument("id"), Some("5"));
    }

    #[test]
    fn test_matched_arguments_are_transient() {
        let mut route = route_with(text_handler(""), &[]);
        route.set_argument("lang", "en", true);

        route.prepare(&request(), [("id", "1"), ("lang", "fr")]);
        assert_eq!(route.argument("id"), Some("1"));
        assert_eq!(route.argument("lang"), Some("fr"));
        assert_eq!(route.saved_arguments().get("lang").map(String::as_str), Some("en"));

        route.prepare(&request(), [("id", "2")]);
        assert_eq!(route.argument("lang"), Some("en"));
        assert_eq!(route.arguments().len(), 2);
    }

    #[test]
    fn test_set_arguments_replaces_both_sets() {
        let mut route = route_with(text_handler(""), &[]);
        route.set_argument("old", "1", true);

        let mut fresh = Arguments::new();
        fresh.insert("new".to_string(), "2".to_string());
        route.set_arguments(fresh.clone(), true);
        assert_eq!(route.arguments(), &fresh);
        assert_eq!(route.saved_arguments(), &fresh);

        route.set_arguments(Arguments::new(), false);
        assert!(route.arguments().is_empty());
        assert_eq!(route.saved_arguments(), &fresh);
    }

    #[test]
    fn test_finalize_is_idempotent() {
        let group = RouteGroup::new("/articles");
        group.add(recording("g", &Trail::default()));

        let mut route = route_with(text_handler(""), &[Arc::clone(&group)]);
        route.add(recording("r", &Trail::default()));

        route.finalize();
        route.finalize();
        assert!(route.is_finalized());
        assert_eq!(route.middleware_stack().names(), vec!["g", "r"]);
        assert_eq!(route.middleware_stack().len(), 2);
    }

    #[tokio::test]
    async fn test_group_middleware_runs_before_route_middleware() {
        let trail = Trail::default();
        let g1 = RouteGroup::new("/api");
        g1.add(recording("g1", &trail));
        let g2 = RouteGroup::new("/v1");
        g2.add(recording("g2", &trail));

        let mut route = route_with(text_handler("ok"), &[Arc::clone(&g1), Arc::clone(&g2)]);
        route.add(recording("r1", &trail));

        let response = route.run(request(), Response::empty()).await.unwrap();
        assert_eq!(response.body_bytes(), "ok");
        assert_eq!(*trail.lock(), vec!["g1", "g2", "r1"]);
    }

    #[tokio::test]
    async fn test_route_middleware_last_added_runs_first() {
        let trail = Trail::default();
        let mut route = route_with(text_handler("ok"), &[]);
        route.add(recording("a", &trail)).add(recording("b", &trail));

        route.run(request(), Response::empty()).await.unwrap();
        assert_eq!(*trail.lock(), vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_dropped_group_is_skipped() {
        let trail = Trail::default();
        let kept = RouteGroup::new("/kept");
        kept.add(recording("kept", &trail));
        let dropped = RouteGroup::new("/dropped");
        dropped.add(recording("dropped", &trail));

        let mut route = route_with(text_handler("ok"), &[Arc::clone(&kept), dropped]);
        assert_eq!(route.groups().len(), 1);

        route.run(request(), Response::empty()).await.unwrap();
        assert_eq!(*trail.lock(), vec!["kept"]);
    }

    #[tokio::test]
    async fn test_add_after_finalize_becomes_outermost() {
        let trail = Trail::default();
        let mut route = route_with(text_handler("ok"), &[]);
        route.add(recording("early", &trail));
        route.run(request(), Response::empty()).await.unwrap();

        route.add(recording("late", &trail));
        trail.lock().clear();
        route.run(request(), Response::empty()).await.unwrap();
        assert_eq!(*trail.lock(), vec!["late", "early"]);
    }

    #[tokio::test]
    async fn test_text_output_is_appended() {
        let mut route = route_with(text_handler("world"), &[]);
        let mut working = Response::text(StatusCode::ACCEPTED, "hello ");
        working
            .headers_mut()
            .insert("x-request-id", http::HeaderValue::from_static("r-42"));

        let response = route.run(request(), working).await.unwrap();
        assert_eq!(response.body_bytes(), "hello world");
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(response.headers()["x-request-id"], "r-42");
        assert_eq!(
            response.headers()[http::header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
        assert_eq!(response.headers().len(), 2);
    }

    #[tokio::test]
    async fn test_text_output_ignored_for_unwritable_body() {
        let mut route = route_with(text_handler("lost"), &[]);
        let mut working = Response::text(StatusCode::OK, "kept");
        working.body_mut().detach();

        let response = route.run(request(), working).await.unwrap();
        assert!(!response.body().is_writable());
    }

    #[tokio::test]
    async fn test_response_output_replaces_working_response() {
        let handler = FnHandler::new(|_req, _res, _args| {
            Box::pin(async {
                Ok(HandlerOutput::Response(Response::text(
                    StatusCode::CREATED,
                    "created",
                )))
            })
        });
        let mut route = route_with(handler, &[]);

        let response = route
            .run(request(), Response::text(StatusCode::OK, "stale"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.body_bytes(), "created");
    }

    #[tokio::test]
    async fn test_handler_sees_arguments() {
        let handler = FnHandler::new(|req, _res, args| {
            Box::pin(async move {
                let from_request = req
                    .extensions()
                    .get::<RouteArguments>()
                    .and_then(|a| a.get("id"))
                    .unwrap_or_default()
                    .to_string();
                Ok(HandlerOutput::text(format!("{}={}", args["id"], from_request)))
            })
        });
        let mut route = route_with(handler, &[]);
        route.prepare(&request(), [("id", "9")]);

        let response = route.run(request(), Response::empty()).await.unwrap();
        assert_eq!(response.body_bytes(), "9=9");
    }

    #[tokio::test]
    async fn test_identifier_resolved_through_resolver() {
        let mut registry = HandlerRegistry::new();
        registry.register("articles:show", text_handler("resolved"));

        let mut route = Route::new([Method::GET], "/", "articles:show", &[], 2);
        route.set_resolver(Arc::new(registry));

        let response = route.run(request(), Response::empty()).await.unwrap();
        assert_eq!(response.body_bytes(), "resolved");
        assert!(route.callable().is_resolved());
    }

    #[tokio::test]
    async fn test_unresolvable_callable_fails_run() {
        let mut route = Route::new([Method::GET], "/", "articles:missing", &[], 3);
        route.set_resolver(Arc::new(HandlerRegistry::new()));
        route.set_argument("id", "1", true);

        let err = route.run(request(), Response::empty()).await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Resolution);
        assert!(!route.callable().is_resolved());
        assert_eq!(route.argument("id"), Some("1"));
    }

    #[tokio::test]
    async fn test_custom_strategy_is_used() {
        struct Uppercase;

        impl InvocationStrategy for Uppercase {
            fn invoke<'a>(
                &'a self,
                handler: &'a dyn Handler,
                request: Request,
                response: &'a mut Response,
                arguments: &'a Arguments,
            ) -> BoxFuture<'a, DispatchResult<HandlerOutput>> {
                Box::pin(async move {
                    match handler.call(request, response, arguments).await? {
                        HandlerOutput::Text(text) => Ok(HandlerOutput::Text(text.to_uppercase())),
                        other => Ok(other),
                    }
                })
            }
        }

        let mut route = route_with(text_handler("shout"), &[]);
        route.set_strategy(Arc::new(Uppercase));
        let response = route.run(request(), Response::empty()).await.unwrap();
        assert_eq!(response.body_bytes(), "SHOUT");
    }

    #[tokio::test]
    async fn test_captured_output_is_appended() {
        let sink = MemorySink::new();
        let mut route = route_with(echoing("[echo]"), &[]);
        route.set_output_stack(Arc::new(OutputBufferStack::new(sink.clone())));

        let response = route
            .run(request(), Response::text(StatusCode::OK, "body"))
            .await
            .unwrap();
        assert_eq!(response.body_bytes(), "body[echo]");
        assert!(sink.contents().is_empty());
    }

    #[tokio::test]
    async fn test_captured_output_is_prepended() {
        let output = Arc::new(OutputBufferStack::new(MemorySink::new()));
        let mut route = route_with(echoing("[echo]"), &[]);
        route.set_output_stack(Arc::clone(&output));
        route.set_output_buffering("prepend").unwrap();

        let response = route
            .run(request(), Response::text(StatusCode::OK, "body"))
            .await
            .unwrap();
        assert_eq!(response.body_bytes(), "[echo]body");
        assert_eq!(output.level(), 0);
    }

    #[tokio::test]
    async fn test_disabled_buffering_lets_output_through() {
        let sink = MemorySink::new();
        let mut route = route_with(echoing("[echo]"), &[]);
        route.set_output_stack(Arc::new(OutputBufferStack::new(sink.clone())));
        route.set_output_buffering(false).unwrap();

        let response = route
            .run(request(), Response::text(StatusCode::OK, "body"))
            .await
            .unwrap();
        assert_eq!(response.body_bytes(), "body");
        assert_eq!(sink.contents(), "[echo]");
    }

    fn delayed_echo(prefix: &'static str, text: &'static str, yields: usize) -> impl Handler {
        FnHandler::new(move |req, _res, _args| {
            Box::pin(async move {
                for _ in 0..yields {
                    tokio::task::yield_now().await;
                }
                let output = req
                    .extensions()
                    .get::<Arc<OutputBufferStack>>()
                    .cloned()
                    .ok_or_else(|| DispatchError::handler("no output stack"))?;
                output.echo(text.as_bytes())?;
                Ok(HandlerOutput::text(prefix))
            })
        })
    }

    fn request_with_output(sink: &MemorySink) -> (Request, Arc<OutputBufferStack>) {
        let output = Arc::new(OutputBufferStack::new(sink.clone()));
        let mut request = request();
        request.extensions_mut().insert(Arc::clone(&output));
        (request, output)
    }

    #[tokio::test]
    async fn test_request_stack_takes_precedence() {
        let sink = MemorySink::new();
        let fallback = Arc::new(OutputBufferStack::new(sink.clone()));
        let mut route = route_with(echoing("[echo]"), &[]);
        route.set_output_stack(Arc::clone(&fallback));

        let (request, output) = request_with_output(&sink);
        output.start();
        let response = route
            .run(request, Response::text(StatusCode::OK, "body"))
            .await
            .unwrap();

        assert_eq!(response.body_bytes(), "body[echo]");
        assert_eq!(output.level(), 1);
        assert_eq!(fallback.level(), 0);
        assert!(output.end().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_dispatches_keep_output_apart() {
        let sink = MemorySink::new();
        let shared = Arc::new(OutputBufferStack::new(sink.clone()));
        let mut first = route_with(delayed_echo("a:", "[A]", 1), &[]);
        first.set_output_stack(Arc::clone(&shared));
        let mut second = route_with(delayed_echo("b:", "[B]", 3), &[]);
        second.set_output_stack(Arc::clone(&shared));

        let (first_request, first_output) = request_with_output(&sink);
        let (second_request, second_output) = request_with_output(&sink);
        let (a, b) = tokio::join!(
            first.run(first_request, Response::empty()),
            second.run(second_request, Response::empty()),
        );

        assert_eq!(a.unwrap().body_bytes(), "a:[A]");
        assert_eq!(b.unwrap().body_bytes(), "b:[B]");
        assert_eq!(first_output.level(), 0);
        assert_eq!(second_output.level(), 0);
        assert_eq!(shared.level(), 0);
        assert!(sink.contents().is_empty());
    }

    #[tokio::test]
    async fn test_capture_closed_when_handler_fails() {
        let handler = FnHandler::new(|req, _res, _args| {
            Box::pin(async move {
                if let Some(output) = req.extensions().get::<Arc<OutputBufferStack>>() {
                    output.echo(b"partial")?;
                }
                Err::<HandlerOutput, _>(DispatchError::handler("render failed"))
            })
        });
        let sink = MemorySink::new();
        let output = Arc::new(OutputBufferStack::new(sink.clone()));
        let mut route = route_with(handler, &[]);
        route.set_output_stack(Arc::clone(&output));

        let err = route.run(request(), Response::empty()).await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Handler);
        assert_eq!(output.level(), 0);
        assert!(sink.contents().is_empty());
    }

    #[tokio::test]
    async fn test_non_buffered_body_drains_capture() {
        let sink = MemorySink::new();
        let output = Arc::new(OutputBufferStack::new(sink.clone()));

        let handler = FnHandler::new(|req, res, _args| {
            Box::pin(async move {
                let output = req
                    .extensions()
                    .get::<Arc<OutputBufferStack>>()
                    .cloned()
                    .ok_or_else(|| DispatchError::handler("no output stack"))?;
                output.echo(b"pre")?;
                let mut body = NonBufferedBody::new(output);
                body.write(b"abc")?;
                *res.body_mut() = Box::new(body);
                Ok(HandlerOutput::Ignored)
            })
        });
        let mut route = route_with(handler, &[]);
        route.set_output_stack(Arc::clone(&output));

        route.run(request(), Response::empty()).await.unwrap();
        assert_eq!(sink.contents(), "preabc");
        assert_eq!(output.level(), 0);
    }
}
