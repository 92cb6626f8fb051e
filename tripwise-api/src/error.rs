use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tripwise_core::CoreError;
use crate::actor::ACTOR_HEADER;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("missing {} header", ACTOR_HEADER)]
    Unauthenticated,
}

impl AppError {
    fn status(&self) -> StatusCode {
        let err = match self {
            AppError::Unauthenticated => return StatusCode::UNAUTHORIZED,
            AppError::Core(err) => err,
        };
        match err {
            CoreError::NotJoinable
            | CoreError::AlreadyJoined
            | CoreError::IsCreator
            | CoreError::InsufficientSeats { .. } => StatusCode::CONFLICT,
            CoreError::NotFound(_) => StatusCode::NOT_FOUND,
            CoreError::ValidationError(_) => StatusCode::BAD_REQUEST,
            CoreError::Forbidden(_) => StatusCode::FORBIDDEN,
            CoreError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CoreError::PartialFailure(_) | CoreError::CorruptRecord(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            AppError::Unauthenticated => "unauthenticated",
            AppError::Core(err) => err.kind(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut body = json!({
            "error": self.kind(),
            "message": self.to_string(),
        });

        match &self {
            AppError::Core(CoreError::PartialFailure(failure)) => {
                body["detail"] = json!(failure);
            }
            AppError::Core(CoreError::CorruptRecord(msg)) => {
                tracing::error!("Corrupt record: {}", msg);
                body["message"] = json!("Internal Server Error");
            }
            AppError::Core(CoreError::StorageUnavailable(msg)) => {
                tracing::warn!("Storage unavailable: {}", msg);
            }
            _ => {}
        }

        (status, Json(body)).into_response()
    }
}
