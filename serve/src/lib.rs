//! Axum transport for the orchestration service (spec.md §6): REST surface, interactive-action
//! endpoint, and the mounted webhook receiver.
//!
//! **Public API**: [`run_serve`], [`run_serve_on_listener`].

mod app;
mod error;
mod routes;

use std::sync::Arc;

use orchestrator::Orchestrator;
use tokio::net::TcpListener;
use tracing::info;
use webhook::ReceiverState;

pub use app::router;

const DEFAULT_ADDR: &str = "127.0.0.1:8080";

/// Runs the server on an existing listener. Used by tests (bind to `127.0.0.1:0`, then pass
/// the listener so the bound port is known before serving starts).
pub async fn run_serve_on_listener(
    listener: TcpListener,
    orchestrator: Arc<Orchestrator>,
    webhook_state: ReceiverState,
    platform: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = listener.local_addr()?;
    info!(%addr, "orchestrator REST surface listening");
    let app = router(orchestrator, webhook_state, platform);
    axum::serve(listener, app).await?;
    Ok(())
}

/// Runs the server. Listens on `addr` (default `127.0.0.1:8080`).
pub async fn run_serve(
    addr: Option<&str>,
    orchestrator: Arc<Orchestrator>,
    webhook_state: ReceiverState,
    platform: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = addr.unwrap_or(DEFAULT_ADDR);
    let listener = TcpListener::bind(addr).await?;
    run_serve_on_listener(listener, orchestrator, webhook_state, platform).await
}
