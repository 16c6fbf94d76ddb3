use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use instructor_embed::web::backends::build_loader;
use instructor_embed::web::logger::setup_logging;
use instructor_embed::web::server::{serve, shutdown_signal};
use instructor_embed::web::{AppState, ServerConfig, SharedAppState};
use instructor_embed::{sys_error, sys_info};
use instructor_embed_types::LifecycleState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::parse();

    setup_logging(&config).map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))?;

    let addr = config
        .socket_addr()
        .with_context(|| format!("invalid listen address {}:{}", config.host, config.port))?;

    let state: SharedAppState =
        Arc::new(AppState::from_config(&config).context("failed to start worker pool")?);
    let params = state.parameters();
    sys_info!(
        "Dispatch parameters: {} workers, chunk size {}",
        params.max_workers,
        params.chunk_size
    );

    // Loading runs in the background; the server answers /health meanwhile.
    let _loader = state.lifecycle.start_loading(build_loader(&config));
    let lifecycle = Arc::clone(&state.lifecycle);
    tokio::spawn(async move {
        let status = lifecycle.wait_until_settled().await;
        match status.state {
            LifecycleState::Ready => sys_info!("Service ready to embed"),
            _ => sys_error!("Model unavailable, /embed will answer 503: {}", status.message),
        }
    });

    serve(addr, state.clone(), shutdown_signal())
        .await
        .context("HTTP server failed")?;

    sys_info!("HTTP server stopped, draining worker pool");
    state.dispatcher.pool().drain().await;
    sys_info!("Shutdown complete");

    Ok(())
}
