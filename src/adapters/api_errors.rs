use crate::domain::error::PipelineError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

// Newtype so the domain error can carry an axum response mapping.
pub struct ApiError(pub PipelineError);

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        Self(err)
    }
}

impl ApiError {
    /// Retryable failures get a 5xx so the gateway re-delivers.
    fn status(&self) -> StatusCode {
        match &self.0 {
            PipelineError::NotFound(_) => StatusCode::NOT_FOUND,
            err if err.is_retryable() => StatusCode::INTERNAL_SERVER_ERROR,
            PipelineError::Decode(_) | PipelineError::Validation(_) => StatusCode::BAD_REQUEST,
            // Cleanup and credential failures are handled inside the cleanup
            // flow and never reach a handler.
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> (&'static str, String) {
        match &self.0 {
            PipelineError::Decode(err) => {
                tracing::warn!("undecodable notification: {err}");
                (
                    "decode_error",
                    "notification body could not be decoded".to_string(),
                )
            }
            PipelineError::Validation(msg) => {
                tracing::warn!("invalid notification: {msg}");
                ("validation_error", msg.clone())
            }
            PipelineError::NotFound(id) => {
                tracing::warn!("notification for unknown payment {id}");
                ("payment_not_found", format!("payment {id} not found"))
            }
            PipelineError::Apply(msg) => {
                tracing::error!("entitlement error: {msg}");
                ("apply_error", "payment could not be applied".to_string())
            }
            PipelineError::Database(err) => {
                tracing::error!("database error: {err}");
                internal()
            }
            PipelineError::Store(msg)
            | PipelineError::Gateway(msg)
            | PipelineError::Cleanup(msg)
            | PipelineError::Credentials(msg) => {
                tracing::error!("internal error: {msg}");
                internal()
            }
        }
    }
}

fn internal() -> (&'static str, String) {
    ("internal_error", "internal error".to_string())
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (error_code, message) = self.body();

        let body = serde_json::json!({
            "error_code": error_code,
            "message": message,
        });

        (status, Json(body)).into_response()
    }
}
