/// HTTP API Layer
///
/// This module provides the REST API endpoints of the service. It handles:
/// - Registration of the component installations this platform hosts
/// - Workflow definition CRUD operations
/// - Instantiation of stored definitions and lifecycle commands
/// - Intake of component notifications from remote platforms

use crate::{
    component::LocalComponentRegistry, notification::NotificationService,
    persistence::WorkflowCodec, placeholder::SettingsStore,
    workflow::{WorkflowRegistry, WorkflowStorage},
};
use axum::Router;
use std::sync::Arc;

// Component installation endpoints
pub mod components;

// Definition management endpoints (POST/GET/PUT/DELETE)
pub mod definitions;

// Instance lifecycle and notification endpoints
pub mod instances;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    /// Persisted workflow documents
    pub storage: WorkflowStorage,
    /// Document <-> graph conversion
    pub codec: WorkflowCodec,
    /// Component installations of this platform
    pub components: Arc<LocalComponentRegistry>,
    /// Running workflow instances
    pub registry: Arc<WorkflowRegistry>,
    /// Bus the aggregators of every instance listen on
    pub notifications: Arc<dyn NotificationService>,
    /// Placeholder history store
    pub settings: Arc<dyn SettingsStore>,
}

/// All API routes
pub fn create_routes() -> Router<AppState> {
    Router::new()
        .merge(components::create_component_routes())
        .merge(definitions::create_definition_routes())
        .merge(instances::create_instance_routes())
}
