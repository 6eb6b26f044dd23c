//! ==============================================================================
//! error.rs - hub error taxonomy
//! ==============================================================================
//!
//! none of these are fatal to the process:
//!     - Validation: rejected at the ingestion boundary, nothing mutated
//!     - ObserverWrite: isolated to one observer, which gets detached
//!     - NotFound: routing-level misses only (queries return empty instead)
//!
//! ==============================================================================

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

pub type Result<T, E = HubError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("invalid field `{field}`: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("observer {id} write failed: {reason}")]
    ObserverWrite { id: u64, reason: String },

    #[error("not found: {0}")]
    NotFound(String),
}

impl HubError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        HubError::Validation { field, reason: reason.into() }
    }

    fn status(&self) -> StatusCode {
        match self {
            HubError::Validation { .. } => StatusCode::BAD_REQUEST,
            HubError::NotFound(_) => StatusCode::NOT_FOUND,
            HubError::ObserverWrite { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for HubError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "success": false, "error": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}
