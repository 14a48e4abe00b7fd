/**
 * Error Conversion
 *
 * Domain errors into `BackendError`, and `BackendError` into a JSON
 * response of the form `{"error": "...", "status": 404}`.
 */
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::backend::collab::CollabError;
use crate::backend::error::types::BackendError;
use crate::backend::pad::PadError;
use crate::backend::storage::StoreError;

impl From<PadError> for BackendError {
    fn from(err: PadError) -> Self {
        match err {
            PadError::NotFound(message) => Self::NotFound(message),
            PadError::Conflict(message) => Self::Conflict(message),
            PadError::Storage(err) => Self::state(err.to_string()),
            other => Self::handler(StatusCode::BAD_REQUEST, other.to_string()),
        }
    }
}

impl From<StoreError> for BackendError {
    fn from(err: StoreError) -> Self {
        PadError::from(err).into()
    }
}

impl From<CollabError> for BackendError {
    fn from(err: CollabError) -> Self {
        match err {
            CollabError::Pad(err) => err.into(),
            CollabError::RateLimited(_) => Self::RateLimited,
            CollabError::Message(err) => Self::SharedError(err),
            other => Self::protocol(other.to_string()),
        }
    }
}

impl IntoResponse for BackendError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = serde_json::json!({
            "error": self.message(),
            "status": status.as_u16(),
        });
        (status, Json(body)).into_response()
    }
}
