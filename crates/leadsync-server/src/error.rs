use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use leadsync_core::SyncError;

/// Unified error type for HTTP responses.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = if let Some(e) = self.0.downcast_ref::<SyncError>() {
            match e {
                SyncError::MalformedPayload(_) => StatusCode::BAD_REQUEST,
                SyncError::DealNotFound(_)
                | SyncError::RowNotFound(_)
                | SyncError::ColumnNotFound(_) => StatusCode::NOT_FOUND,
                SyncError::Transport { .. } | SyncError::Auth { .. } => StatusCode::BAD_GATEWAY,
                SyncError::Config(_)
                | SyncError::Io(_)
                | SyncError::Json(_)
                | SyncError::Yaml(_) => StatusCode::INTERNAL_SERVER_ERROR,
            }
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        let body = serde_json::json!({ "status": "error", "message": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
