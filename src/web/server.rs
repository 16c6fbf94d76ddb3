// HTTP router and server loop

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;

use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};

use super::response_helpers::{cors_preflight, json_error};
use super::routes;
use super::state::SharedAppState;
use crate::{sys_debug, sys_info};

/// Route one request. Never fails; errors become JSON bodies.
pub async fn handle_request(
    req: Request<Body>,
    state: SharedAppState,
) -> Result<Response<Body>, Infallible> {
    sys_debug!("[HTTP] {} {}", req.method(), req.uri().path());

    match (req.method(), req.uri().path()) {
        (&Method::OPTIONS, _) => Ok(cors_preflight()),
        (&Method::GET, "/") => routes::root::handle().await,
        (&Method::GET, "/health") => routes::health::handle(state).await,
        (&Method::GET, "/ready") => routes::ready::handle(state).await,
        (&Method::POST, "/embed") | (&Method::POST, "/vectorize") => {
            routes::embed::handle(req, state).await
        }
        (&Method::GET, "/system-info") => routes::system_info::handle(state).await,
        _ => Ok(json_error(StatusCode::NOT_FOUND, "Not Found")),
    }
}

/// Serve until `shutdown` resolves, then stop accepting connections and let
/// in-flight requests finish. The worker pool is left for the caller to drain.
pub async fn serve<F>(addr: SocketAddr, state: SharedAppState, shutdown: F) -> hyper::Result<()>
where
    F: Future<Output = ()>,
{
    let make_svc = make_service_fn({
        let state = state.clone();
        move |_conn| {
            let state = state.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |req| handle_request(req, state.clone())))
            }
        }
    });

    let server = Server::try_bind(&addr)?.serve(make_svc);
    sys_info!("Embedding server listening on http://{}", server.local_addr());
    sys_info!("Available endpoints:");
    sys_info!("  GET  /health        - Lifecycle status and progress");
    sys_info!("  GET  /ready         - loading | ready | error");
    sys_info!("  POST /embed         - Embed (instruction, text) pairs");
    sys_info!("  POST /vectorize     - Alias of /embed");
    sys_info!("  GET  /system-info   - Host resources and pool parameters");

    server.with_graceful_shutdown(shutdown).await
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            crate::sys_warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                crate::sys_warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    sys_info!("Shutdown signal received");
}
