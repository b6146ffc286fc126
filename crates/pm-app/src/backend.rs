mod routes;
mod schemas;
mod state;

use std::sync::Arc;
use anyhow::Context;
use axum::Router;
use log::info;
use tokio::net::TcpListener;
use crate::backend::routes::api_routes;
use crate::backend::state::BackendState;
use crate::config::AppConfig;
use crate::generator::Generator;
use crate::generator::notify::NotificationFeed;

pub fn router(state: Arc<BackendState>) -> Router {
    Router::new()
        .merge(api_routes())
        .with_state(state)
}

/// Serve the dashboard API until the process is stopped.
pub async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let feed = Arc::new(NotificationFeed::new());
    let generator = Generator::from_config(&config.api, config.policy.clone(), feed.clone(), None)
        .context("invalid model API configuration")?;
    let app = router(Arc::new(BackendState::new(generator, feed)));

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind port {}", config.port))?;

    info!("Starting backend server on port {}", config.port);
    axum::serve(listener, app).await?;

    Ok(())
}
