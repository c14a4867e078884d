//! HTTP server and graceful shutdown.
//!
//! On shutdown the server:
//! 1. Immediately stops `listener.accept()`, so no new connections are made.
//! 2. Closes idle keep-alive connections and lets in-flight requests finish.
//! 3. Returns from [`Server::serve`], which lets `main` exit cleanly.
//!
//! [`Server::serve`] shuts down on SIGTERM or Ctrl-C;
//! [`Server::serve_with_shutdown`] on any future the caller supplies, which
//! is how tests stop a server bound to an ephemeral port.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use http::StatusCode;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use hyper_util::server::graceful::GracefulShutdown;
use tokio::net::TcpListener;
use tracing::{Instrument, debug, error, info, info_span};

use crate::error::Error;
use crate::method::Method;
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;

/// The HTTP server.
pub struct Server {
    listener: TcpListener,
}

impl Server {
    /// Binds to `addr` right away, so a port of `0` can be resolved with
    /// [`local_addr`](Server::local_addr) before serving.
    ///
    /// ```rust,no_run
    /// # async fn run() -> Result<(), stella::Error> {
    /// use stella::{Router, Server};
    ///
    /// let server = Server::bind("0.0.0.0:8080".parse().unwrap()).await?;
    /// server.serve(Router::new()).await
    /// # }
    /// ```
    pub async fn bind(addr: SocketAddr) -> Result<Self, Error> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        Ok(self.listener.local_addr()?)
    }

    /// Serves `router` until SIGTERM or Ctrl-C, then drains in-flight
    /// requests.
    pub async fn serve(self, router: Router) -> Result<(), Error> {
        self.serve_with_shutdown(router, shutdown_signal()).await
    }

    /// Serves `router` until `signal` resolves, then drains in-flight
    /// requests.
    pub async fn serve_with_shutdown(
        self,
        router: Router,
        signal: impl Future<Output = ()>,
    ) -> Result<(), Error> {
        let addr = self.local_addr()?;
        let listener = self.listener;
        let router = Arc::new(router);

        info!(%addr, "stella listening");

        let builder = ConnBuilder::new(TokioExecutor::new());
        let graceful = GracefulShutdown::new();
        let mut tasks = tokio::task::JoinSet::new();

        tokio::pin!(signal);

        loop {
            tokio::select! {
                // Checked first so a shutdown stops accepting even while
                // connections are queued.
                biased;

                () = &mut signal => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let router = Arc::clone(&router);
                    let io = TokioIo::new(stream);

                    // Called once per request on the connection.
                    let svc = service_fn(move |req| {
                        let router = Arc::clone(&router);
                        async move { dispatch(router, req, remote_addr).await }
                    });
                    let conn = builder.serve_connection_with_upgrades(io, svc);
                    let conn = graceful.watch(conn.into_owned());

                    tasks.spawn(async move {
                        if let Err(e) = conn.await {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks so the set stays bounded.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        // Idle connections close now; busy ones after their current response.
        graceful.shutdown().await;
        while tasks.join_next().await.is_some() {}

        info!("stella stopped");
        Ok(())
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Routes one request and produces one response.
///
/// Every failure becomes a status code here, so hyper never sees an error.
async fn dispatch(
    router: Arc<Router>,
    req: hyper::Request<hyper::body::Incoming>,
    remote_addr: SocketAddr,
) -> Result<http::Response<http_body_util::Full<bytes::Bytes>>, std::convert::Infallible> {
    let span = info_span!(
        "request",
        method = %req.method(),
        path = %req.uri().path(),
        peer = %remote_addr,
    );

    let response = async move {
        let Ok(method) = Method::try_from(req.method()) else {
            return Response::status(StatusCode::METHOD_NOT_ALLOWED);
        };
        let Some((handler, params)) = router.lookup(method, req.uri().path()) else {
            return Response::status(StatusCode::NOT_FOUND);
        };

        // Contract operations carry no request body.
        let (parts, _body) = req.into_parts();
        handler.call(Request::new(parts, params)).await
    }
    .instrument(span.clone())
    .await;

    span.in_scope(|| debug!(status = %response.status_code(), "responded"));
    Ok(response.into_inner())
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first SIGTERM or SIGINT (Ctrl-C). Ctrl-C only on Windows.
///
/// A signal handler that cannot be installed leaves its arm pending rather
/// than stopping the server.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
