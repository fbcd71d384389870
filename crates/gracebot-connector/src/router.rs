use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use gracebot_core::app::BotApp;

use crate::handlers;

#[derive(Clone)]
pub struct AppState {
    pub app: Arc<BotApp>,
}

pub fn build_router(app: Arc<BotApp>) -> Router {
    let state = Arc::new(AppState { app });

    Router::new()
        .route("/api/messages", post(handlers::handle_messages))
        .route("/healthz", get(handlers::healthz))
        .with_state(state)
}

/// Serve the webhook on `listen_addr` until Ctrl-C.
pub async fn serve(listen_addr: &str, app: Arc<BotApp>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!("listening on http://{}", listener.local_addr()?);

    axum::serve(listener, build_router(app))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("webhook server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
