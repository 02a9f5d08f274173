//! HTTP rendering of service errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

use crate::core::WidgetError;

/// An error that can be converted into an HTTP response.
///
/// Every variant renders as `{ "error": <message> }`.
#[derive(Debug)]
pub enum ApiError {
    /// The caller sent something unusable.
    BadRequest(String),

    /// uv was missing, failed, or produced unusable output. The message is
    /// returned as is.
    ToolFailure(String),

    /// Anything else. Returned as `Internal server error: <message>`.
    InternalServerError(String),
}

impl ApiError {
    /// HTTP status this error renders with.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::ToolFailure(_) | Self::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<WidgetError> for ApiError {
    fn from(err: WidgetError) -> Self {
        if !err.is_caller_facing() {
            Self::InternalServerError(err.to_string())
        } else if err.status_code() == 400 {
            Self::BadRequest(err.to_string())
        } else {
            Self::ToolFailure(err.to_string())
        }
    }
}

/// Lets handlers use `?` on operations returning `anyhow::Result`.
impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<WidgetError>() {
            Ok(widget) => widget.into(),
            Err(other) => Self::InternalServerError(format!("{other:#}")),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            Self::BadRequest(message) => json!({ "error": message }),
            Self::ToolFailure(message) => {
                tracing::warn!("Request failed: {}", message);
                json!({ "error": message })
            }
            Self::InternalServerError(err) => {
                tracing::error!("Internal server error: {}", err);
                json!({ "error": format!("Internal server error: {err}") })
            }
        };

        (status, Json(body)).into_response()
    }
}
