/// sciflow: scientific-workflow orchestration core
///
/// Main entry point for the sciflow server. Initializes configuration and starts
/// the HTTP server with definition storage and workflow lifecycle control.

use sciflow::{config::Config, server::start_server};

/// Application entry point
///
/// The server provides:
/// - Workflow definition API at /api/definitions/*
/// - Workflow instance control at /api/instances/*
/// - Component notification intake at /api/notifications
/// - Health check at /healthz
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration (defaults to 0.0.0.0:3004 and ./data)
    let config = Config::default();

    start_server(config).await?;

    Ok(())
}
