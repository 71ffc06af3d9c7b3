/// Workflow definition REST API endpoints
///
/// Definitions are stored as persisted document text. Every write is validated by
/// parsing the document (with migration) before it reaches storage.

use crate::api::AppState;
use crate::error::WorkflowError;
use crate::persistence::read_workflow_version;
use crate::placeholder::PlaceholderResolver;
use crate::workflow::storage::StoredDefinition;
use crate::workflow::WorkflowGraph;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Response for definition creation/update operations
#[derive(Debug, Serialize)]
pub struct DefinitionResponse {
    pub id: String,
    pub version: u32,
    pub message: String,
}

/// Placeholders of one node or component type
#[derive(Debug, Serialize)]
pub struct PlaceholderSet {
    /// Rendered `${...}` form of each placeholder
    pub placeholders: Vec<String>,
    /// Current values by placeholder name
    pub values: BTreeMap<String, Option<String>>,
}

/// Create definition management routes
pub fn create_definition_routes() -> Router<AppState> {
    Router::new()
        .route("/api/definitions", post(create_definition).get(list_definitions))
        .route(
            "/api/definitions/{id}",
            get(get_definition).put(update_definition).delete(delete_definition),
        )
        .route("/api/definitions/{id}/placeholders", get(get_placeholders))
}

/// Parse a document and derive its storage record
fn validate(state: &AppState, text: String) -> Result<(WorkflowGraph, StoredDefinition), StatusCode> {
    let graph = state.codec.read_with_migration(&text).map_err(|e| {
        tracing::warn!("⚠️ Rejected workflow document: {}", e);
        match e {
            WorkflowError::Io(_) | WorkflowError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    })?;
    let version = read_workflow_version(&text).map_err(|_| StatusCode::BAD_REQUEST)?;

    let definition = StoredDefinition {
        id: graph.identifier().to_string(),
        name: graph.name.clone(),
        version,
        document: text,
    };
    Ok((graph, definition))
}

/// Store a new definition
///
/// POST /api/definitions
/// Body: persisted workflow document
async fn create_definition(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<DefinitionResponse>, StatusCode> {
    let (graph, definition) = validate(&state, body)?;

    match state.storage.insert_definition(&definition).await {
        Ok(true) => {}
        Ok(false) => return Err(StatusCode::CONFLICT),
        Err(e) => {
            tracing::error!("Failed to save definition: {}", e);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    tracing::info!(
        "💾 Stored definition {} with {} nodes",
        definition.id,
        graph.node_count()
    );

    Ok(Json(DefinitionResponse {
        id: definition.id.clone(),
        version: definition.version,
        message: format!("Definition '{}' created successfully", definition.id),
    }))
}

/// List stored definitions
///
/// GET /api/definitions
/// Returns: { "definitions": [{ "id": "...", "name": "...", "version": 1, ... }] }
async fn list_definitions(State(state): State<AppState>) -> Result<Json<Value>, StatusCode> {
    match state.storage.list_definitions().await {
        Ok(definitions) => Ok(Json(json!({ "definitions": definitions }))),
        Err(e) => {
            tracing::error!("Failed to list definitions: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// GET /api/definitions/{id}
async fn get_definition(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StoredDefinition>, StatusCode> {
    match state.storage.get_definition(&id).await {
        Ok(Some(definition)) => Ok(Json(definition)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!("Failed to get definition {}: {}", id, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Replace an existing definition
///
/// PUT /api/definitions/{id}
/// The document identifier must match the path.
async fn update_definition(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: String,
) -> Result<Json<DefinitionResponse>, StatusCode> {
    let (_, definition) = validate(&state, body)?;
    if definition.id != id {
        return Err(StatusCode::BAD_REQUEST);
    }

    match state.storage.get_definition(&id).await {
        Ok(Some(_)) => {}
        Ok(None) => return Err(StatusCode::NOT_FOUND),
        Err(_) => return Err(StatusCode::INTERNAL_SERVER_ERROR),
    }

    if let Err(e) = state.storage.save_definition(&definition).await {
        tracing::error!("Failed to update definition: {}", e);
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }

    tracing::info!("💾 Updated definition {}", id);

    Ok(Json(DefinitionResponse {
        id,
        version: definition.version,
        message: format!("Definition '{}' updated successfully", definition.id),
    }))
}

/// DELETE /api/definitions/{id}
async fn delete_definition(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    match state.storage.delete_definition(&id).await {
        Ok(true) => {
            tracing::info!("Deleted definition: {}", id);
            Ok(Json(json!({ "message": "Definition deleted successfully" })))
        }
        Ok(false) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!("Failed to delete definition: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Placeholders of a stored definition, per node and per component type
///
/// GET /api/definitions/{id}/placeholders
/// Returns: { "instances": { node_id: {...} }, "types": { component_id: {...} } }
async fn get_placeholders(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let definition = match state.storage.get_definition(&id).await {
        Ok(Some(definition)) => definition,
        Ok(None) => return Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!("Failed to get definition {}: {}", id, e);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };
    let graph = state
        .codec
        .read_with_migration(&definition.document)
        .map_err(|_| StatusCode::UNPROCESSABLE_ENTITY)?;

    let resolver = PlaceholderResolver::for_workflow(&graph, state.settings.clone())
        .await
        .map_err(|e| {
            tracing::error!("Failed to load placeholder history: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let mut instances = BTreeMap::new();
    let mut types = BTreeMap::new();
    for type_id in resolver.placeholder_types() {
        for instance_id in resolver.instances_of_type(&type_id) {
            let set = PlaceholderSet {
                placeholders: resolver.rendered_placeholders_of_instance(&instance_id),
                values: resolver.placeholders_of_instance(&instance_id),
            };
            if !set.placeholders.is_empty() {
                instances.insert(instance_id, set);
            }
        }
        let set = PlaceholderSet {
            placeholders: resolver.rendered_placeholders_of_type(&type_id),
            values: resolver.placeholders_of_type(&type_id),
        };
        if !set.placeholders.is_empty() {
            types.insert(type_id, set);
        }
    }

    Ok(Json(json!({ "instances": instances, "types": types })))
}
