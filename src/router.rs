//! Radix-tree request router and the server side of the contract.
//!
//! One tree per HTTP method. O(path-length) lookup. Contract operations are
//! registered with [`Router::bind`], which routes on the descriptor's own
//! template so the server can only ever listen where clients call.

use std::borrow::Cow;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use http::StatusCode;
use matchit::Router as MatchitRouter;
use tracing::{error, warn};

use crate::codec::CodecRegistry;
use crate::contract::{self, EndpointDescriptor};
use crate::error::MissingHeaderError;
use crate::handler::{BoxedHandler, Handler, IntoReply};
use crate::method::Method;
use crate::request::Request;
use crate::response::Response;

/// The application router.
///
/// Build it once at startup; pass it to [`Server::serve`](crate::Server::serve).
/// Each registration returns `self` so calls chain naturally.
pub struct Router {
    routes: HashMap<Method, MatchitRouter<BoxedHandler>>,
    codecs: Arc<CodecRegistry>,
}

impl Router {
    /// A router that encodes replies with the default codecs.
    pub fn new() -> Self {
        Self::with_codecs(CodecRegistry::default())
    }

    /// A router that encodes replies with `codecs`.
    pub fn with_codecs(codecs: CodecRegistry) -> Self {
        Self { routes: HashMap::new(), codecs: Arc::new(codecs) }
    }

    /// Binds business logic to a contract operation.
    ///
    /// For each matching request the identity header and the path values are
    /// extracted, `handler(identity, path_args)` is awaited and its reply is
    /// encoded as `text/plain`:
    ///
    /// ```rust
    /// use stella::Router;
    /// use stella::contract::{SAY, WELCOME_ANONYMOUS};
    ///
    /// Router::new()
    ///     .bind(&SAY, |user, args: Vec<String>| async move {
    ///         format!("{user} just said {}", args[0])
    ///     })
    ///     .bind(&WELCOME_ANONYMOUS, |_, _| async { "Are you a new member?" });
    /// ```
    ///
    /// An operation that declares an identity header answers
    /// `401 Unauthorized` when the header is absent. An anonymous operation
    /// ignores the header and passes an empty identity. A handler that
    /// errors or panics is answered with `500 Internal Server Error`.
    ///
    /// # Panics
    ///
    /// Panics if the descriptor fails [`EndpointDescriptor::validate`] or its
    /// route is already taken. Both are startup errors.
    pub fn bind<F, Fut>(self, descriptor: &'static EndpointDescriptor, handler: F) -> Self
    where
        F: Fn(String, Vec<String>) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: IntoReply + Send + 'static,
    {
        if let Err(e) = descriptor.validate() {
            panic!("invalid operation `{}`: {e}", descriptor.name);
        }

        let handler = Arc::new(handler);
        let codecs = Arc::clone(&self.codecs);
        self.add(descriptor.method, descriptor.path, move |req: Request| {
            let handler = Arc::clone(&handler);
            let codecs = Arc::clone(&codecs);
            async move { serve_operation(descriptor, handler.as_ref(), &codecs, req).await }
        })
    }

    /// Registers a raw handler for a method + path pair.
    ///
    /// Path parameters use `{name}` syntax; `req.param("name")` retrieves
    /// them still percent-encoded.
    pub fn on(self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.add(method, path, handler)
    }

    fn add(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.routes
            .entry(method)
            .or_default()
            .insert(path, handler.into_boxed_handler())
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    pub(crate) fn lookup(
        &self,
        method: Method,
        path: &str,
    ) -> Option<(BoxedHandler, HashMap<String, String>)> {
        let tree = self.routes.get(&method)?;
        let matched = tree.at(path).ok()?;
        let handler = Arc::clone(matched.value);
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((handler, params))
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

// ── Contract dispatch ─────────────────────────────────────────────────────────

async fn serve_operation<F, Fut>(
    descriptor: &'static EndpointDescriptor,
    handler: &F,
    codecs: &CodecRegistry,
    req: Request,
) -> Response
where
    F: Fn(String, Vec<String>) -> Fut,
    Fut: Future + Send + 'static,
    Fut::Output: IntoReply + Send + 'static,
{
    let identity = match identity(descriptor, &req) {
        Ok(identity) => identity,
        Err(e) => {
            warn!(operation = descriptor.name, "{e}");
            return Response::builder().status(StatusCode::UNAUTHORIZED).text(e.to_string());
        }
    };

    let path_args = match path_args(descriptor, &req) {
        Ok(args) => args,
        Err(name) => {
            warn!(operation = descriptor.name, param = name, "undecodable path parameter");
            return Response::builder()
                .status(StatusCode::BAD_REQUEST)
                .text(format!("path parameter `{name}` is not valid percent-encoded UTF-8"));
        }
    };

    // A panicking handler takes down its own task, not the connection.
    let output = match tokio::spawn(handler(identity, path_args)).await {
        Ok(output) => output,
        Err(e) => {
            error!(operation = descriptor.name, error = %e, "handler panicked");
            return Response::status(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let reply = match output.into_reply() {
        Ok(reply) => reply,
        Err(e) => {
            error!(operation = descriptor.name, error = %e, "handler failed");
            return Response::status(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    match codecs.encode(&reply, &contract::CONTENT_TYPE) {
        Ok(body) => Response::encoded(body),
        Err(e) => {
            error!(operation = descriptor.name, error = %e, "reply could not be encoded");
            Response::status(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

fn identity(descriptor: &EndpointDescriptor, req: &Request) -> Result<String, MissingHeaderError> {
    let Some(header) = descriptor.identity_header else {
        return Ok(String::new());
    };
    req.header(header).map(Cow::into_owned).ok_or(MissingHeaderError { header })
}

/// Unescaped path values in declared order, or the name of the first one
/// that cannot be decoded.
fn path_args(descriptor: &EndpointDescriptor, req: &Request) -> Result<Vec<String>, &'static str> {
    descriptor
        .path_params
        .iter()
        .map(|name| {
            req.param(name)
                .and_then(|raw| contract::unescape(raw).ok())
                .ok_or(*name)
        })
        .collect()
}
