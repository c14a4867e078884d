//! Handler traits and type erasure.
//!
//! The router stores handlers of unrelated types in one tree per method, so
//! each one is erased behind [`ErasedHandler`] and shared through an `Arc`:
//!
//! ```text
//! async fn raw(req: Request) -> Response { … }          ← Router::on
//! |identity, args| async { … }                         ← Router::bind
//!        ↓ into_boxed_handler()
//! Arc<dyn ErasedHandler>                               ← stored in the tree
//!        ↓ handler.call(req) per request
//! Pin<Box<dyn Future<Output = Response>>>
//! ```
//!
//! Per request that costs one `Arc` clone and one virtual call.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::BoxError;
use crate::request::Request;
use crate::response::{IntoResponse, Response};

// ── Internal types ────────────────────────────────────────────────────────────

/// A heap-allocated, type-erased future that resolves to a [`Response`].
pub(crate) type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// return type of the public `Handler` trait's `into_boxed_handler` method.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture;
}

#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── Raw handlers ──────────────────────────────────────────────────────────────

/// Implemented for every raw route handler.
///
/// Sealed: satisfied automatically by any
/// `Fn(Request) -> impl Future<Output = impl IntoResponse>`, and by nothing
/// else.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture {
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.into_response() })
    }
}

// ── Contract handlers ─────────────────────────────────────────────────────────

/// What business logic bound with [`Router::bind`](crate::Router::bind) may
/// return: the reply text, or an error the router answers with
/// `500 Internal Server Error`.
pub trait IntoReply {
    fn into_reply(self) -> Result<String, BoxError>;
}

impl IntoReply for String {
    fn into_reply(self) -> Result<String, BoxError> { Ok(self) }
}

impl IntoReply for &'static str {
    fn into_reply(self) -> Result<String, BoxError> { Ok(self.to_owned()) }
}

impl<T, E> IntoReply for Result<T, E>
where
    T: Into<String>,
    E: Into<BoxError>,
{
    fn into_reply(self) -> Result<String, BoxError> {
        self.map(Into::into).map_err(Into::into)
    }
}
