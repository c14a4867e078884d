//! Outgoing HTTP response type and the [`IntoResponse`] conversion trait.
//!
//! Handlers build a [`Response`] and return it. Contract bindings never do
//! this by hand: the router encodes their reply through the codec registry
//! and wraps it with [`Response::encoded`].

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderValue};
use http::StatusCode;
use http_body_util::Full;

use crate::codec::{EncodedBody, MediaType};

// ── Response ─────────────────────────────────────────────────────────────────

/// An outgoing HTTP response.
///
/// # Shortcuts (200 OK or a bare status)
///
/// ```rust
/// use http::StatusCode;
/// use stella::Response;
///
/// Response::text("hello");
/// Response::status(StatusCode::NO_CONTENT);
/// ```
///
/// # Builder (custom status or media type)
///
/// ```rust
/// use http::StatusCode;
/// use stella::Response;
/// use stella::codec::MediaType;
///
/// Response::builder()
///     .status(StatusCode::UNAUTHORIZED)
///     .text("who are you?");
///
/// Response::builder()
///     .bytes(MediaType::new("application/octet-stream"), vec![0xff, 0xfe]);
/// ```
#[derive(Debug)]
pub struct Response {
    inner: http::Response<Full<Bytes>>,
}

impl Response {
    /// `200 OK` with `text/plain; charset=utf-8`.
    pub fn text(body: impl Into<String>) -> Self {
        Self::builder().text(body)
    }

    /// `200 OK` carrying a body produced by a codec.
    pub fn encoded(body: EncodedBody) -> Self {
        Self::builder().encoded(body)
    }

    /// Response with no body.
    pub fn status(code: StatusCode) -> Self {
        Self::builder().status(code).no_body()
    }

    /// Builder for responses that need a custom status or media type.
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder { status: StatusCode::OK }
    }

    pub fn status_code(&self) -> StatusCode {
        self.inner.status()
    }

    pub(crate) fn into_inner(self) -> http::Response<Full<Bytes>> {
        self.inner
    }
}

// ── ResponseBuilder ───────────────────────────────────────────────────────────

/// Fluent builder for [`Response`].
///
/// Obtain via [`Response::builder()`]. Defaults to `200 OK`.
/// Terminated by a typed body method.
pub struct ResponseBuilder {
    status: StatusCode,
}

impl ResponseBuilder {
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code;
        self
    }

    /// Terminate with a plain-text body (`text/plain; charset=utf-8`).
    pub fn text(self, body: impl Into<String>) -> Response {
        self.finish(MediaType::TEXT_PLAIN, Bytes::from(body.into()))
    }

    /// Terminate with raw bytes of the given media type.
    pub fn bytes(self, media_type: MediaType, body: impl Into<Bytes>) -> Response {
        self.finish(media_type, body.into())
    }

    /// Terminate with a codec-encoded body.
    pub fn encoded(self, body: EncodedBody) -> Response {
        self.finish(body.media_type, body.bytes)
    }

    /// Terminate with no body (e.g. `204 No Content`).
    pub fn no_body(self) -> Response {
        self.build(None, Bytes::new())
    }

    fn finish(self, media_type: MediaType, body: Bytes) -> Response {
        self.build(Some(media_type), body)
    }

    fn build(self, media_type: Option<MediaType>, body: Bytes) -> Response {
        let mut inner = http::Response::new(Full::new(body));
        *inner.status_mut() = self.status;

        if let Some(value) = media_type.and_then(|m| HeaderValue::try_from(m.to_string()).ok()) {
            inner.headers_mut().insert(CONTENT_TYPE, value);
        }
        Response { inner }
    }
}

// ── IntoResponse ──────────────────────────────────────────────────────────────

/// Conversion into an HTTP [`Response`].
///
/// Implement on your own types to return them directly from raw handlers
/// registered with [`Router::on`](crate::Router::on).
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response { self }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response { Response::text(self) }
}

impl IntoResponse for String {
    fn into_response(self) -> Response { Response::text(self) }
}

/// Return a [`StatusCode`] directly from a handler: `return StatusCode::NOT_FOUND`
impl IntoResponse for StatusCode {
    fn into_response(self) -> Response { Response::status(self) }
}
