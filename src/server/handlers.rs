//! Endpoint handlers.
//!
//! Bodies are taken as raw bytes and decoded here so that malformed input is
//! reported as `Invalid JSON in request body` rather than the framework's
//! default rejection.

use axum::{Json, body::Bytes, extract::State, response::IntoResponse};
use serde::de::DeserializeOwned;
use serde_json::json;

use super::AppState;
use super::error::ApiError;
use crate::core::WidgetError;
use crate::operations::{
    AddDependencyRequest, AddDependencyResponse, GetTreeRequest, GetTreeResponse, InitializeResponse,
};

/// Payload of `GET get-example`.
pub const EXAMPLE_MESSAGE: &str = "This is /pep723widget/get-example endpoint!";

/// `GET {base}pep723widget/get-example`
pub async fn get_example() -> impl IntoResponse {
    Json(json!({ "data": EXAMPLE_MESSAGE }))
}

/// `POST {base}pep723widget/initialize`
///
/// The body carries no fields. An empty body is accepted; a non-empty one
/// must still be valid JSON.
pub async fn initialize(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<InitializeResponse>, ApiError> {
    if !body.iter().all(u8::is_ascii_whitespace) {
        serde_json::from_slice::<serde_json::Value>(&body).map_err(|_| WidgetError::InvalidJson)?;
    }
    Ok(Json(state.service.initialize().await?))
}

/// `POST {base}pep723widget/add-dependency`
pub async fn add_dependency(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<AddDependencyResponse>, ApiError> {
    let request: AddDependencyRequest = parse_body(&body)?;
    Ok(Json(state.service.add_dependency(request).await?))
}

/// `POST {base}pep723widget/get-tree`
pub async fn get_tree(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<GetTreeResponse>, ApiError> {
    let request: GetTreeRequest = parse_body(&body)?;
    Ok(Json(state.service.get_tree(request).await?))
}

/// Decode a JSON object body into `T`.
///
/// Anything that is not an object of the expected shape is malformed input.
fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, WidgetError> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!("Rejecting request body: {}", e);
        WidgetError::InvalidJson
    })
}
