/// Server setup and initialization
///
/// Wires together all components: database, comment-type registry, attachment
/// store, orphan sweep and HTTP routes.

use crate::{
    api::{create_comment_routes, create_document_routes, create_entity_routes, AppState},
    attachment::{OrphanSweeper, SweepScheduler},
    config::Config,
    service::Backend,
};
use anyhow::{Context, Result};
use axum::{extract::DefaultBodyLimit, routing::get, Router};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Largest accepted request body, uploads included
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Open storage, seed the taxonomy and start the orphan sweep
///
/// Any failure here aborts startup.
pub async fn create_state(config: &Config) -> Result<AppState> {
    tracing::info!("📁 Blob storage root: {}", config.storage.root.display());
    let backend = Backend::open(config)
        .await
        .context("Failed to initialize backend storage")?;

    tracing::info!(
        "🏷️ Comment types ready: {} registered",
        backend.registry.list().len()
    );

    let sweep = if config.sweep.cron.trim().is_empty() {
        tracing::info!("⏸️ Orphan sweep disabled");
        None
    } else {
        let sweeper = Arc::new(OrphanSweeper::new(
            Arc::clone(&backend.attachments),
            Duration::from_secs(config.sweep.grace_secs),
        ));
        let scheduler = Arc::new(
            SweepScheduler::new(sweeper)
                .await
                .context("Failed to initialize sweep scheduler")?,
        );
        scheduler.start(&config.sweep.cron).await?;
        Some(scheduler)
    };

    Ok(AppState { backend, sweep })
}

/// Build the router over an initialized state
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check endpoint
        .route("/healthz", get(health_check))
        .merge(create_entity_routes())
        .merge(create_comment_routes())
        .merge(create_document_routes())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

/// Start the HTTP server with the given configuration
///
/// Serves until Ctrl-C, then stops the sweep job.
pub async fn start_server(config: Config) -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    tracing::info!("Starting taskhub server...");

    let state = create_state(&config).await?;
    let sweep = state.sweep.clone();
    let app = create_router(state);

    // Bind to the configured address
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&bind_addr).await?;

    tracing::info!("Server listening on http://{}", bind_addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(sweep) = sweep {
        sweep.stop().await?;
    }
    tracing::info!("👋 Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("❌ Failed to listen for shutdown signal: {}", e);
    }
}

/// Health check endpoint handler
async fn health_check() -> &'static str {
    "ok"
}
