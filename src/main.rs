use std::net::SocketAddr;

use docuchat_backend::core::config::AppPaths;
use docuchat_backend::{logging, server, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _log_guard = logging::init(&AppPaths::new());

    let state = AppState::initialize().await?;

    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(state.config.server.port);
    let addr = SocketAddr::from(([127, 0, 0, 1], port));

    let app = server::build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("DocuChat backend listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
