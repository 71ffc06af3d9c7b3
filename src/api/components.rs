/// Component installation REST API endpoints
///
/// Platforms announce the components they host here; the codec resolves nodes of
/// stored definitions against these installations when instantiating them.

use crate::api::AppState;
use crate::component::ComponentRegistry;
use crate::workflow::{ComponentDescriptor, PlatformId};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

/// Query of an unregister request
#[derive(Debug, Default, Deserialize)]
pub struct PlatformQuery {
    /// Platform of the installation; the installation without platform when absent
    pub platform: Option<String>,
}

/// Create component installation routes
pub fn create_component_routes() -> Router<AppState> {
    Router::new()
        .route("/api/components", get(list_components).post(register_component))
        .route("/api/components/{identifier}", delete(unregister_component))
}

/// Register (or replace) an installation
///
/// POST /api/components
/// Body: { "identifier": "...", "name": "...", "version": "...", "platform": "...", ... }
async fn register_component(
    State(state): State<AppState>,
    Json(descriptor): Json<ComponentDescriptor>,
) -> Result<(StatusCode, Json<ComponentDescriptor>), StatusCode> {
    if descriptor.identifier.is_empty() || descriptor.placeholder {
        return Err(StatusCode::BAD_REQUEST);
    }
    state.components.register(descriptor.clone());
    Ok((StatusCode::CREATED, Json(descriptor)))
}

/// List every installation
///
/// GET /api/components
/// Returns: { "components": [{ "identifier": "...", "platform": "...", ... }] }
async fn list_components(State(state): State<AppState>) -> Json<Value> {
    let mut identifiers = state.components.identifiers();
    identifiers.sort();
    let components: Vec<ComponentDescriptor> = identifiers
        .iter()
        .flat_map(|identifier| state.components.installations(identifier, None))
        .collect();
    Json(json!({ "components": components }))
}

/// DELETE /api/components/{identifier}?platform=...
async fn unregister_component(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
    Query(query): Query<PlatformQuery>,
) -> Result<Json<Value>, StatusCode> {
    let platform = query.platform.map(PlatformId::new);
    if state.components.unregister(&identifier, platform.as_ref()) {
        Ok(Json(json!({ "message": "Component unregistered successfully" })))
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}
