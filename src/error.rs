use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::engine::GenerationId;
use crate::models::MovieId;

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("Movie not found: {0}")]
    MovieNotFound(MovieId),

    #[error("User not found: {0}")]
    UserNotFound(Uuid),

    #[error("Generation {requested} is no longer current (current is {current})")]
    StaleGeneration {
        requested: GenerationId,
        current: GenerationId,
    },

    #[error("Index build failed: {0}")]
    BuildFailure(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::MovieNotFound(_) | AppError::UserNotFound(_) => StatusCode::NOT_FOUND,
            AppError::StaleGeneration { .. } => StatusCode::CONFLICT,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Database(_)
            | AppError::Cache(_)
            | AppError::BuildFailure(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
