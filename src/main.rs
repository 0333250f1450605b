// main.rs
// Axum server wiring: reads configuration, connects the stores to the backend, and serves the admin API.
//
// Endpoints (all JSON):
// - POST /login                      -> signs in against the backend, sets the session cookie
// - POST /logout                     -> clears the session
// - GET  /api/dashboard              -> occupancy, income, pending and overdue figures
// - /api/rooms, /api/tenants, /api/billings, /api/reminders -> CRUD plus lifecycle actions
// - /api/face/...                    -> access logs, notifications, detection monitor

use anyhow::Context;
use dotenvy::dotenv;
use std::sync::Arc;
use tokio::{net::TcpListener, sync::broadcast::error::RecvError};
use tracing_subscriber::EnvFilter;

use kosflow::{config::Config, routes, state};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("kosflow=info")),
        )
        .init();

    let config = Config::from_env().context("invalid configuration")?;
    let addr = config.bind_addr;
    let state = Arc::new(
        state::init_state(config)
            .await
            .context("failed to initialize state")?,
    );

    let mut alerts = state.monitor.subscribe();
    tokio::spawn(async move {
        loop {
            match alerts.recv().await {
                Ok(alert) => {
                    tracing::warn!(key = %alert.key, at = %alert.detected_at, "{}", alert.message)
                }
                Err(RecvError::Lagged(skipped)) => tracing::debug!(skipped, "alert log lagging"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let app = routes::build_router(state.clone());

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("cannot bind {addr}"))?;
    tracing::info!("Listening on http://{addr}");
    axum::serve(listener, app).await?;

    state.monitor.stop().await;
    Ok(())
}
