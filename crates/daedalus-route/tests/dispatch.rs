//! Dispatch integration tests.
//!
//! These tests exercise a route the way a dispatcher does: build it once,
//! then `prepare` and `run` it for several requests in a row.

use bytes::Bytes;
use daedalus_core::{
    BodyStream, CallableRef, DispatchError, ErrorCategory, FnHandler, Handler, HandlerOutput,
    HandlerRegistry, MemorySink, NonBufferedBody, OutputBufferStack, Request, Response,
    ResponseExt,
};
use daedalus_middleware::{DeferredMiddleware, FnMiddleware, MiddlewareRegistry};
use daedalus_route::{OutputBuffering, Route, RouteGroup};
use http::{HeaderValue, Method, StatusCode};
use parking_lot::Mutex;
use std::sync::Arc;

fn make_request(uri: &str) -> Request {
    http::Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Bytes::new())
        .unwrap()
}

fn show_article() -> impl Handler {
    FnHandler::new(|_req, _res, args| {
        Box::pin(async move {
            let id = args.get("id").map_or("?", String::as_str);
            let lang = args.get("lang").map_or("?", String::as_str);
            Ok(HandlerOutput::text(format!("article {id} ({lang})")))
        })
    })
}

#[tokio::test]
async fn test_forwarded_dispatch_does_not_leak_arguments() {
    let mut route = Route::new(
        [Method::GET],
        "/articles/{id}",
        CallableRef::handler(show_article()),
        &[],
        0,
    );
    route.set_argument("lang", "en", true);

    let first = make_request("/articles/1");
    route.prepare(&first, [("id", "1"), ("lang", "de")]);
    let response = route.run(first, Response::empty()).await.unwrap();
    assert_eq!(response.body_bytes(), "article 1 (de)");

    // A second attempt without a language falls back to the saved one.
    let second = make_request("/articles/2");
    route.prepare(&second, [("id", "2")]);
    let response = route.run(second, Response::empty()).await.unwrap();
    assert_eq!(response.body_bytes(), "article 2 (en)");
}

#[tokio::test]
async fn test_group_and_route_layers_wrap_handler() {
    let trail: Arc<Mutex<Vec<String>>> = Arc::default();
    let layer = |name: &'static str| {
        let trail = Arc::clone(&trail);
        FnMiddleware::new(name, move |request, response, next| {
            let trail = Arc::clone(&trail);
            Box::pin(async move {
                trail.lock().push(format!("{name}:in"));
                let response = next.run(request, response).await;
                trail.lock().push(format!("{name}:out"));
                response
            })
        })
    };

    let api = RouteGroup::new("/api");
    api.add(layer("api"));
    let admin = RouteGroup::new("/admin");
    admin.add(layer("admin-a")).add(layer("admin-b"));

    let mut route = Route::new(
        [Method::GET],
        "/api/admin/articles/{id}",
        CallableRef::handler(show_article()),
        &[Arc::clone(&api), Arc::clone(&admin)],
        4,
    );
    route.add(layer("route"));

    let request = make_request("/api/admin/articles/3");
    route.prepare(&request, [("id", "3")]);
    route.run(request, Response::empty()).await.unwrap();

    assert_eq!(
        *trail.lock(),
        vec![
            "api:in",
            "admin-b:in",
            "admin-a:in",
            "route:in",
            "route:out",
            "admin-a:out",
            "admin-b:out",
            "api:out",
        ]
    );
}

#[tokio::test]
async fn test_identifiers_resolved_lazily() {
    let mut handlers = HandlerRegistry::new();
    handlers.register("articles:show", show_article());

    let mut middleware = MiddlewareRegistry::new();
    middleware.register(
        "cache",
        FnMiddleware::new("cache", |request, response, next| {
            Box::pin(async move {
                let mut response = next.run(request, response).await?;
                response
                    .headers_mut()
                    .insert("cache-control", HeaderValue::from_static("max-age=60"));
                Ok(response)
            })
        }),
    );

    let mut route = Route::new([Method::GET], "/articles/{id}", "articles:show", &[], 1);
    route.set_resolver(Arc::new(handlers));
    route.add(DeferredMiddleware::new("cache", Arc::new(middleware)));
    assert!(!route.callable().is_resolved());

    let request = make_request("/articles/5");
    route.prepare(&request, [("id", "5"), ("lang", "fr")]);
    let response = route.run(request, Response::empty()).await.unwrap();

    assert_eq!(response.body_bytes(), "article 5 (fr)");
    assert_eq!(response.headers().get("cache-control").unwrap(), "max-age=60");
    assert!(route.callable().is_resolved());
}

#[tokio::test]
async fn test_middleware_rejection_skips_handler() {
    let invoked = Arc::new(Mutex::new(false));
    let flag = Arc::clone(&invoked);
    let handler = FnHandler::new(move |_req, _res, _args| {
        let flag = Arc::clone(&flag);
        Box::pin(async move {
            *flag.lock() = true;
            Ok(HandlerOutput::Ignored)
        })
    });

    let mut route = Route::new([Method::POST], "/articles", CallableRef::handler(handler), &[], 2);
    route.add(FnMiddleware::new("auth", |_request, _response, _next| {
        Box::pin(async {
            Err::<Response, _>(DispatchError::rejected(StatusCode::FORBIDDEN, "read only"))
        })
    }));

    let err = route
        .run(make_request("/articles"), Response::empty())
        .await
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Rejected);
    assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    assert!(!*invoked.lock());
}

#[tokio::test]
async fn test_streaming_handler_flushes_buffered_output_first() {
    let sink = MemorySink::new();
    let output = Arc::new(OutputBufferStack::new(sink.clone()));

    let handler = FnHandler::new(|req, res, _args| {
        Box::pin(async move {
            let output = req
                .extensions()
                .get::<Arc<OutputBufferStack>>()
                .cloned()
                .ok_or_else(|| DispatchError::handler("output stack missing"))?;
            output.echo(b"<!-- header -->")?;

            let mut body = NonBufferedBody::new(output);
            let written = body.write(b"<p>chunk</p>")?;
            assert_eq!(written, "<!-- header --><p>chunk</p>".len());
            *res.body_mut() = Box::new(body);
            Ok(HandlerOutput::text("<p>tail</p>"))
        })
    });

    let mut route = Route::new([Method::GET], "/stream", CallableRef::handler(handler), &[], 3);
    route.set_output_stack(Arc::clone(&output));
    route.set_output_buffering(OutputBuffering::Prepend).unwrap();

    let response = route
        .run(make_request("/stream"), Response::empty())
        .await
        .unwrap();

    assert_eq!(sink.contents(), "<!-- header --><p>chunk</p><p>tail</p>");
    assert!(sink.flush_count() >= 1);
    assert!(response.body().to_string().is_empty());
    assert_eq!(output.level(), 0);
}
