/// Workflow instance REST API endpoints
///
/// Lifecycle commands are fire-and-forget: an accepted command answers
/// `202 Accepted` before the components have been called, a command the current
/// state does not allow answers `409 Conflict` and changes nothing.

use crate::api::AppState;
use crate::runtime::{WorkflowInstance, WorkflowState};
use crate::workflow::WorkflowInformation;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

/// Request body for instantiating a stored definition
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateInstanceRequest {
    /// Instantiating user; "anonymous" when absent
    pub user: Option<String>,
    /// Instance name; the definition name when absent
    pub name: Option<String>,
}

/// Notification delivered by a remote platform
#[derive(Debug, Deserialize)]
pub struct NotificationRequest {
    pub topic: String,
    pub body: String,
}

/// Instance information plus its current state
#[derive(Debug, Serialize)]
pub struct InstanceView {
    #[serde(flatten)]
    pub information: WorkflowInformation,
    pub state: WorkflowState,
}

impl InstanceView {
    fn of(instance: &WorkflowInstance) -> Self {
        Self {
            information: instance.information().clone(),
            state: instance.state(),
        }
    }
}

/// Create instance and notification routes
pub fn create_instance_routes() -> Router<AppState> {
    Router::new()
        .route("/api/definitions/{id}/instances", post(create_instance))
        .route("/api/instances", get(list_instances))
        .route("/api/instances/{id}", get(get_instance).delete(dispose_instance))
        .route("/api/instances/{id}/{command}", post(command_instance))
        .route("/api/notifications", post(deliver_notification))
}

/// Load a stored definition (with migration) and instantiate it
///
/// POST /api/definitions/{id}/instances
/// Body: { "user": "...", "name": "..." }
async fn create_instance(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<CreateInstanceRequest>,
) -> Result<(StatusCode, Json<InstanceView>), StatusCode> {
    let definition = match state.storage.get_definition(&id).await {
        Ok(Some(definition)) => definition,
        Ok(None) => return Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!("Failed to get definition {}: {}", id, e);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let graph = state.codec.read_with_migration(&definition.document).map_err(|e| {
        tracing::error!("Stored definition {} no longer parses: {}", id, e);
        StatusCode::UNPROCESSABLE_ENTITY
    })?;

    let user = payload.user.as_deref().unwrap_or("anonymous");
    let instance = state
        .registry
        .create_workflow_instance(user, graph, payload.name.as_deref())
        .await;

    Ok((StatusCode::CREATED, Json(InstanceView::of(&instance))))
}

/// GET /api/instances
async fn list_instances(State(state): State<AppState>) -> Json<Value> {
    let instances: Vec<InstanceView> = state
        .registry
        .informations()
        .into_iter()
        .filter_map(|information| state.registry.workflow(&information.identifier))
        .map(|instance| InstanceView::of(&instance))
        .collect();
    Json(json!({ "instances": instances }))
}

/// GET /api/instances/{id}
async fn get_instance(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<InstanceView>, StatusCode> {
    state
        .registry
        .workflow(&id)
        .map(|instance| Json(InstanceView::of(&instance)))
        .ok_or(StatusCode::NOT_FOUND)
}

/// Issue a lifecycle command
///
/// POST /api/instances/{id}/{command} with command one of start, pause, resume, cancel
async fn command_instance(
    State(state): State<AppState>,
    Path((id, command)): Path<(String, String)>,
) -> Result<(StatusCode, Json<InstanceView>), StatusCode> {
    let instance = state.registry.workflow(&id).ok_or(StatusCode::NOT_FOUND)?;

    let accepted = match command.as_str() {
        "start" => instance.start(),
        "pause" => instance.pause(),
        "resume" => instance.resume(),
        "cancel" => instance.cancel(),
        _ => return Err(StatusCode::BAD_REQUEST),
    };
    respond(accepted, &instance)
}

/// DELETE /api/instances/{id}
async fn dispose_instance(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<InstanceView>), StatusCode> {
    let instance = state.registry.workflow(&id).ok_or(StatusCode::NOT_FOUND)?;
    let accepted = state.registry.dispose_workflow_instance(&id);
    respond(accepted, &instance)
}

fn respond(
    accepted: bool,
    instance: &Arc<WorkflowInstance>,
) -> Result<(StatusCode, Json<InstanceView>), StatusCode> {
    if accepted {
        Ok((StatusCode::ACCEPTED, Json(InstanceView::of(instance))))
    } else {
        Err(StatusCode::CONFLICT)
    }
}

/// Deliver a component notification to local subscribers
///
/// POST /api/notifications
/// Body: { "topic": "component.state.finished:<workflow>", "body": "<component instance>" }
async fn deliver_notification(
    State(state): State<AppState>,
    Json(payload): Json<NotificationRequest>,
) -> StatusCode {
    tracing::debug!("📥 Notification '{}' ({})", payload.topic, payload.body);
    state.notifications.send(&payload.topic, &payload.body);
    StatusCode::ACCEPTED
}
