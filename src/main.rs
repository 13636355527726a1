/// Taskhub: audited project/task backend
///
/// Main entry point. Reads configuration from the environment and starts the
/// HTTP server.

use taskhub::{config::Config, server::start_server};

/// Application entry point
///
/// The server provides:
/// - Project and task CRUD at /projects/* and /tasks/*
/// - Comment trails at /{projects|tasks}/{id}/comments
/// - Documents at /{projects|tasks}/{id}/documents
/// - Health check at /healthz
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration (TASKHUB_* environment variables, defaults otherwise)
    let config = Config::default();

    start_server(config).await?;

    Ok(())
}
