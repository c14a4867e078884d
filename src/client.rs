//! The calling side of the contract.
//!
//! A [`Client`] is built once at startup and cloned into every call site;
//! clones share one pooled hyper connection client. A call resolves the
//! descriptor's template, sends the identity header, and decodes the body
//! through the codec registry by the *declared* result type:
//!
//! ```rust,no_run
//! # async fn run() -> Result<(), stella::Error> {
//! use stella::{Client, ClientConfig};
//! use stella::contract::SAY;
//!
//! let client = Client::new(&ClientConfig::new("http://127.0.0.1:8080"))?;
//! let reply = client.invoke(&SAY, "Frederic", ["hello"]).await?;
//! assert_eq!(reply, "Frederic just said hello");
//! # Ok(())
//! # }
//! ```
//!
//! Failures come back as distinct [`Error`] variants: arity and identity
//! mistakes before any I/O, transport failures (refused, timed out,
//! cancelled) when the server was never heard from, codec failures when it
//! answered with something undecodable, and [`Error::Status`] for non-2xx.
//! Nothing is retried.

use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use http::header::{ACCEPT, CONTENT_TYPE, HeaderValue};
use http::uri::{Authority, Scheme};
use http::{StatusCode, Uri};
use http_body_util::Full;
use hyper_util::client::legacy::Client as HttpClient;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::codec::{CodecRegistry, ValueType, read_to_end};
use crate::config::ClientConfig;
use crate::contract::{self, EndpointDescriptor, SAY, WELCOME, WELCOME_ANONYMOUS};
use crate::error::{ArgumentError, ConfigError, Error, TransportError};

// ── RemoteCall ────────────────────────────────────────────────────────────────

/// One invocation of a contract operation.
///
/// Construction checks the arguments against the descriptor, so a
/// `RemoteCall` that exists can always be sent.
#[derive(Clone, Debug)]
pub struct RemoteCall {
    descriptor: &'static EndpointDescriptor,
    identity: String,
    path_args: Vec<String>,
    body: Option<String>,
}

impl RemoteCall {
    /// Fails with [`ArgumentError`] if the number of `path_args` differs
    /// from the descriptor's parameters, or if the operation sends an
    /// identity header and `identity` is not a legal header value.
    pub fn new<I, S>(
        descriptor: &'static EndpointDescriptor,
        identity: impl Into<String>,
        path_args: I,
    ) -> Result<Self, ArgumentError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let identity = identity.into();
        let path_args: Vec<String> = path_args.into_iter().map(Into::into).collect();

        descriptor.check_arity(path_args.len())?;
        if descriptor.requires_identity() && HeaderValue::from_str(&identity).is_err() {
            return Err(ArgumentError::InvalidIdentity { operation: descriptor.name });
        }

        Ok(Self { descriptor, identity, path_args, body: None })
    }

    /// Attaches a plain-text request body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn descriptor(&self) -> &'static EndpointDescriptor {
        self.descriptor
    }
}

// ── Client ────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
struct BaseUrl {
    scheme: Scheme,
    authority: Authority,
    prefix: String,
}

impl BaseUrl {
    fn parse(url: &str) -> Result<Self, ConfigError> {
        let uri: Uri = url.parse().map_err(|source| ConfigError::BaseUrl {
            url: url.to_owned(),
            source,
        })?;
        let parts = uri.into_parts();
        let (Some(scheme), Some(authority)) = (parts.scheme, parts.authority) else {
            return Err(ConfigError::BaseUrlShape(url.to_owned()));
        };
        let has_query = parts.path_and_query.as_ref().is_some_and(|p| p.query().is_some());
        if scheme != Scheme::HTTP || has_query {
            return Err(ConfigError::BaseUrlShape(url.to_owned()));
        }
        let prefix = parts
            .path_and_query
            .map(|p| p.path().trim_end_matches('/').to_owned())
            .unwrap_or_default();

        Ok(Self { scheme, authority, prefix })
    }
}

/// Long-lived handle for calling contract operations.
///
/// Cheap to clone; clones share the connection pool and codecs.
#[derive(Clone)]
pub struct Client {
    http: HttpClient<HttpConnector, Full<Bytes>>,
    base: BaseUrl,
    timeout: Duration,
    codecs: Arc<CodecRegistry>,
}

impl Client {
    /// Builds a client with the default codecs.
    ///
    /// Runs the contract self-check, so a broken contract fails here rather
    /// than at the first call.
    pub fn new(config: &ClientConfig) -> Result<Self, Error> {
        Self::with_codecs(config, CodecRegistry::default())
    }

    pub fn with_codecs(config: &ClientConfig, codecs: CodecRegistry) -> Result<Self, Error> {
        contract::validate()?;
        let base = BaseUrl::parse(&config.base_url)?;

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(config.connect_timeout()));
        let http = HttpClient::builder(TokioExecutor::new()).build(connector);

        Ok(Self {
            http,
            base,
            timeout: config.timeout(),
            codecs: Arc::new(codecs),
        })
    }

    /// Calls `descriptor` and decodes the reply as text.
    pub async fn invoke<I, S>(
        &self,
        descriptor: &'static EndpointDescriptor,
        identity: &str,
        path_args: I,
    ) -> Result<String, Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.call(RemoteCall::new(descriptor, identity, path_args)?).await
    }

    /// Sends `call` and decodes the reply as `T`.
    ///
    /// The codec is chosen by `T`, not by the response `Content-Type`; a
    /// type no registered codec supports fails before any I/O.
    pub async fn call<T: Any + Send>(&self, call: RemoteCall) -> Result<T, Error> {
        let operation = call.descriptor.name;
        self.codecs.find(ValueType::of::<T>(), &contract::CONTENT_TYPE)?;

        let request = self.request(&call)?;
        debug!(operation, method = %request.method(), uri = %request.uri(), "calling");

        let exchanged = tokio::time::timeout(self.timeout, self.exchange(request)).await;
        let (status, body) = match exchanged {
            Ok(Ok(exchanged)) => exchanged,
            Ok(Err(e)) => {
                warn!(operation, error = %e, "call failed");
                return Err(e);
            }
            Err(_) => {
                warn!(operation, timeout = ?self.timeout, "call timed out");
                return Err(TransportError::Timeout(self.timeout).into());
            }
        };

        if !status.is_success() {
            debug!(operation, %status, "call refused");
            return Err(Error::Status {
                operation,
                status,
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        Ok(self.codecs.decode::<T>(body, &contract::CONTENT_TYPE)?)
    }

    /// Runs the call on its own task.
    ///
    /// The returned [`PendingCall`] resolves exactly once: to the result, or
    /// to [`TransportError::Cancelled`] after [`PendingCall::abort`].
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn spawn<T: Any + Send>(&self, call: RemoteCall) -> PendingCall<T> {
        let client = self.clone();
        PendingCall {
            handle: tokio::spawn(async move { client.call(call).await }),
        }
    }

    /// [`invoke`](Client::invoke) on its own task. Argument errors are
    /// delivered through the returned handle like every other failure.
    pub fn spawn_invoke<I, S>(
        &self,
        descriptor: &'static EndpointDescriptor,
        identity: impl Into<String>,
        path_args: I,
    ) -> PendingCall<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        match RemoteCall::new(descriptor, identity, path_args) {
            Ok(call) => self.spawn(call),
            Err(e) => PendingCall {
                handle: tokio::spawn(async move { Err(e.into()) }),
            },
        }
    }

    fn request(&self, call: &RemoteCall) -> Result<http::Request<Full<Bytes>>, Error> {
        let descriptor = call.descriptor;
        let path = descriptor.resolve(call.path_args.as_slice())?;

        let uri = Uri::builder()
            .scheme(self.base.scheme.clone())
            .authority(self.base.authority.clone())
            .path_and_query(format!("{}{path}", self.base.prefix))
            .build()
            .map_err(TransportError::from)?;

        let mut builder = http::Request::builder()
            .method(http::Method::from(descriptor.method))
            .uri(uri)
            .header(ACCEPT, contract::CONTENT_TYPE.essence());

        if let Some(header) = descriptor.identity_header {
            let value = HeaderValue::from_str(&call.identity)
                .map_err(|_| ArgumentError::InvalidIdentity { operation: descriptor.name })?;
            builder = builder.header(header, value);
        }

        let body = match &call.body {
            Some(text) => {
                let encoded = self.codecs.encode(text, &contract::CONTENT_TYPE)?;
                builder = builder.header(CONTENT_TYPE, encoded.media_type.to_string());
                encoded.bytes
            }
            None => Bytes::new(),
        };

        Ok(builder.body(Full::new(body)).map_err(TransportError::from)?)
    }

    async fn exchange(
        &self,
        request: http::Request<Full<Bytes>>,
    ) -> Result<(StatusCode, Bytes), Error> {
        let response = self.http.request(request).await.map_err(TransportError::from)?;
        let status = response.status();
        let body = read_to_end(response.into_body()).await?;
        Ok((status, body))
    }
}

/// Typed calls, one per contract operation.
impl Client {
    /// `GET /say/{command}` → `"<identity> just said <command>"`.
    pub async fn say(&self, identity: &str, command: &str) -> Result<String, Error> {
        self.invoke(&SAY, identity, [command]).await
    }

    /// `GET /welcome` → `"Welcome <identity>"`.
    pub async fn welcome(&self, identity: &str) -> Result<String, Error> {
        self.invoke(&WELCOME, identity, None::<String>).await
    }

    /// `GET /welcome-anonymous` → `"Are you a new member?"`.
    pub async fn welcome_anonymous(&self) -> Result<String, Error> {
        self.invoke(&WELCOME_ANONYMOUS, "", None::<String>).await
    }
}

// ── PendingCall ───────────────────────────────────────────────────────────────

/// A call running on its own task.
///
/// Await it for the result. Dropping it detaches the task; use
/// [`abort`](PendingCall::abort) to cancel.
#[derive(Debug)]
pub struct PendingCall<T> {
    handle: JoinHandle<Result<T, Error>>,
}

impl<T> PendingCall<T> {
    /// Cancels the call. Awaiting afterwards yields
    /// [`TransportError::Cancelled`] unless the call had already finished.
    pub fn abort(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl<T> Future for PendingCall<T> {
    type Output = Result<T, Error>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.handle).poll(cx).map(|joined| match joined {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(TransportError::Cancelled.into()),
            Err(e) => std::panic::resume_unwind(e.into_panic()),
        })
    }
}
