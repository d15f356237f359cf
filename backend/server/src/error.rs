use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use protocol::{EncodingError, ExecutionError};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::search::QueryError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Malformed query: {0}")]
    MalformedQuery(#[from] EncodingError),

    #[error("{0}")]
    InvalidQuery(#[from] QueryError),

    #[error("Unknown collection `{0}`")]
    UnknownCollection(String),

    #[error("Not found")]
    NotFound,

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Insufficient permissions")]
    Forbidden,

    #[error("Internal error: {0}")]
    Execution(#[from] ExecutionError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MalformedQuery { .. } | AppError::InvalidQuery { .. } => {
                StatusCode::BAD_REQUEST
            }
            AppError::UnknownCollection { .. } | AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Execution { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            error!("Request failed: {self}");
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
