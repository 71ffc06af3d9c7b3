/// Server setup and initialization
///
/// Wires together all components: definition storage, component registry, codec,
/// notification bus, workflow-instance registry and HTTP routes.

use crate::{
    api::{create_routes, AppState},
    component::LocalComponentRegistry,
    config::Config,
    notification::LocalNotificationBus,
    persistence::WorkflowCodec,
    placeholder::{FileSettingsStore, SettingsStore},
    runtime::LoggingComponentController,
    workflow::{PlatformId, WorkflowRegistry, WorkflowStorage},
};
use anyhow::Result;
use axum::{routing::get, Router};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Create the main Axum application with all routes
///
/// Opens (or creates) the definitions database under the configured data
/// directory and builds the shared application state.
pub async fn create_app(config: Config) -> Result<Router> {
    tracing::info!("📁 Ensuring data directory exists: {}", config.storage.data_dir);
    std::fs::create_dir_all(&config.storage.data_dir)
        .map_err(|e| anyhow::anyhow!("Failed to create data directory: {}", e))?;

    tracing::info!("📋 Initializing workflow definition storage");
    let options = SqliteConnectOptions::new()
        .filename(config.storage.database_path())
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(options)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to open definitions database: {}", e))?;
    let storage = WorkflowStorage::new(pool);
    storage
        .init_schema()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to initialize definitions schema: {}", e))?;

    let local_platform = PlatformId::new(config.platform.local_platform.clone());
    tracing::info!("🏗️ Local platform: {}", local_platform);

    let state = build_state(
        storage,
        Arc::new(LocalComponentRegistry::new()),
        Arc::new(FileSettingsStore::new(config.storage.settings_dir())),
        local_platform,
    );

    tracing::info!("📡 Creating HTTP router with all endpoints");
    let app = app_router(state);

    tracing::info!("✅ Application initialized successfully");
    Ok(app)
}

/// Shared state over the given storage and collaborators
pub fn build_state(
    storage: WorkflowStorage,
    components: Arc<LocalComponentRegistry>,
    settings: Arc<dyn SettingsStore>,
    local_platform: PlatformId,
) -> AppState {
    let notifications = Arc::new(LocalNotificationBus::new());
    let registry = WorkflowRegistry::new(
        Arc::new(LoggingComponentController),
        notifications.clone(),
        local_platform.clone(),
    );

    AppState {
        storage,
        codec: WorkflowCodec::new(components.clone(), local_platform),
        components,
        registry: Arc::new(registry),
        notifications,
        settings,
    }
}

/// Health check plus the API routes
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .merge(create_routes().with_state(state))
}

/// Start the HTTP server with the given configuration
///
/// Creates the application and starts the Axum server on the configured address and port.
pub async fn start_server(config: Config) -> Result<()> {
    // Initialize tracing subscriber for logging, RUST_LOG overrides the level
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    tracing::info!("Starting sciflow server...");

    let app = create_app(config.clone()).await?;

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&bind_addr).await?;

    tracing::info!("Server listening on http://{}", bind_addr);

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

/// Health check endpoint handler
async fn health_check() -> &'static str {
    "ok"
}
