//! HTTP server configuration and request routing.
//!
//! Requests flow through middleware in order:
//! 1. Request ID generation
//! 2. Request/response logging
//! 3. Timeout enforcement
//! 4. Bearer authentication (`/wall`, when enabled)
//! 5. Handler execution
//!
//! # Graceful Shutdown
//!
//! On SIGINT or SIGTERM the server stops accepting connections, asks open
//! connections to finish their in-flight requests, and gives them
//! [`SHUTDOWN_GRACE`] before dropping them.

use std::{future::Future, io, net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    extract::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use hyper::body::Incoming;
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto,
};
use rustls::ServerConfig;
use tokio::{net::TcpListener, sync::watch, task::JoinSet};
use tokio_rustls::TlsAcceptor;
use tower::Service;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{handlers, middleware::auth::require_bearer_token, state::AppState};

/// Default per-request deadline.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// How long open connections get to finish after shutdown starts.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Creates the router with the default request timeout.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use webhooker_api::{create_router, AppState};
/// use webhooker_core::storage::memory::{MemoryCredentialStore, MemoryMessageStore};
///
/// let state = AppState::new(
///     Arc::new(MemoryCredentialStore::new()),
///     Arc::new(MemoryMessageStore::new()),
/// );
/// let app = create_router(state);
/// ```
pub fn create_router(state: AppState) -> Router {
    create_router_with_timeout(state, DEFAULT_REQUEST_TIMEOUT)
}

/// Creates the router with all routes and middleware.
pub fn create_router_with_timeout(state: AppState, request_timeout: Duration) -> Router {
    let health_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/live", get(handlers::liveness_check));

    let mut wall_routes = Router::new().route("/wall", get(handlers::read_wall));
    if state.wall_requires_token {
        wall_routes =
            wall_routes.layer(middleware::from_fn_with_state(state.clone(), require_bearer_token));
    }

    let api_routes = Router::new().route("/webhook", post(handlers::ingest_webhook));

    Router::new()
        .merge(health_routes)
        .merge(wall_routes)
        .merge(api_routes)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(inject_request_id))
        .with_state(state)
}

/// Middleware to inject request ID into all responses.
async fn inject_request_id(mut req: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    req.extensions_mut().insert(request_id.clone());

    let mut response = next.run(req).await;

    if let Ok(header_value) = request_id.parse() {
        response.headers_mut().insert("X-Request-Id", header_value);
    }

    response
}

/// Serves the router over TLS until `shutdown` resolves.
///
/// Each accepted connection runs on its own task. Handshake and connection
/// errors are logged and only affect that connection.
///
/// # Errors
///
/// Returns `io::Error` if the listener's local address cannot be read.
pub async fn serve_tls<F>(
    listener: TcpListener,
    tls: Arc<ServerConfig>,
    app: Router,
    shutdown: F,
) -> io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let acceptor = TlsAcceptor::from(tls);
    let (stop_tx, stop_rx) = watch::channel(false);
    let mut connections = JoinSet::new();

    info!(addr = %listener.local_addr()?, "HTTPS server listening");

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            () = &mut shutdown => break,
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "failed to accept connection");
                        continue;
                    },
                };
                connections.spawn(serve_connection(
                    stream,
                    peer,
                    acceptor.clone(),
                    app.clone(),
                    stop_rx.clone(),
                ));
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {},
        }
    }

    info!(open_connections = connections.len(), "stopped accepting connections");
    let _ = stop_tx.send(true);

    let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
        while connections.join_next().await.is_some() {}
    })
    .await;

    if drained.is_err() {
        warn!(remaining = connections.len(), "grace period elapsed, dropping connections");
        connections.shutdown().await;
    }

    info!("HTTPS server stopped gracefully");
    Ok(())
}

async fn serve_connection(
    stream: tokio::net::TcpStream,
    peer: SocketAddr,
    acceptor: TlsAcceptor,
    app: Router,
    mut stop: watch::Receiver<bool>,
) {
    let tls_stream = match acceptor.accept(stream).await {
        Ok(tls_stream) => tls_stream,
        Err(e) => {
            debug!(peer = %peer, error = %e, "TLS handshake failed");
            return;
        },
    };

    let service = hyper::service::service_fn(move |request: Request<Incoming>| {
        app.clone().call(request)
    });

    let builder = auto::Builder::new(TokioExecutor::new());
    let connection = builder.serve_connection(TokioIo::new(tls_stream), service);
    tokio::pin!(connection);

    let result = tokio::select! {
        result = connection.as_mut() => result,
        _ = stop.changed() => {
            connection.as_mut().graceful_shutdown();
            connection.await
        },
    };

    if let Err(e) = result {
        debug!(peer = %peer, error = %e, "connection closed with error");
    }
}

/// Waits for shutdown signal (CTRL+C or SIGTERM).
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received CTRL+C, starting graceful shutdown");
        },
        () = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{self, StatusCode},
    };
    use tower::ServiceExt;
    use webhooker_core::storage::memory::{MemoryCredentialStore, MemoryMessageStore};

    use super::*;

    fn state() -> AppState {
        AppState::new(Arc::new(MemoryCredentialStore::new()), Arc::new(MemoryMessageStore::new()))
    }

    #[tokio::test]
    async fn responses_carry_request_id() {
        let app = create_router(state());

        let response = app
            .oneshot(http::Request::builder().uri("/live").body(Body::empty()).expect("request"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let request_id = response.headers().get("x-request-id").expect("request id header");
        assert!(Uuid::parse_str(request_id.to_str().expect("ascii")).is_ok());
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let app = create_router(state());

        let response = app
            .oneshot(http::Request::builder().uri("/nope").body(Body::empty()).expect("request"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn webhook_only_accepts_post() {
        let app = create_router(state());

        let response = app
            .oneshot(http::Request::builder().uri("/webhook").body(Body::empty()).expect("request"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
