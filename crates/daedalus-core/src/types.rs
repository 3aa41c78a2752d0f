//! Common types used throughout the dispatch core.

use crate::body::{BodyStream, BufferedBody};
use bytes::Bytes;
use indexmap::IndexMap;
use std::future::Future;
use std::pin::Pin;

/// A boxed future, used wherever a trait method has to return one.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The HTTP request type seen by middleware and handlers.
pub type Request = http::Request<Bytes>;

/// A type-erased response body.
pub type Body = Box<dyn BodyStream>;

/// The HTTP response type produced by middleware and handlers.
///
/// The body is a [`BodyStream`] so that handlers can swap a
/// [`BufferedBody`] for a [`NonBufferedBody`](crate::NonBufferedBody)
/// when output has to reach the client as soon as it is written.
pub type Response = http::Response<Body>;

/// Route arguments: an insertion-ordered name to value mapping.
pub type Arguments = IndexMap<String, String>;

/// Convenience constructors and accessors for [`Response`].
pub trait ResponseExt {
    /// Creates an empty `200 OK` response with a writable [`BufferedBody`].
    fn empty() -> Response;

    /// Creates a response with the given status and text body.
    fn text(status: http::StatusCode, text: &str) -> Response;

    /// Returns the full body content without moving its cursor.
    fn body_bytes(&self) -> Bytes;
}

impl ResponseExt for Response {
    fn empty() -> Response {
        http::Response::new(Box::new(BufferedBody::new()))
    }

    fn text(status: http::StatusCode, text: &str) -> Response {
        let mut response: Response =
            http::Response::new(Box::new(BufferedBody::with_content(text.to_owned())));
        *response.status_mut() = status;
        response.headers_mut().insert(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response
    }

    fn body_bytes(&self) -> Bytes {
        self.body().to_bytes()
    }
}
