//! error kinds surfaced by the ingestion endpoint and their http mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use thiserror::Error;

pub type IngestResult<T> = Result<T, IngestError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum IngestError {
    #[error("empty data")]
    EmptyBody,

    #[error("invalid data: {0}")]
    Malformed(String),

    #[error("invalid data: field '{field}' is not numeric")]
    NotNumeric { field: &'static str },

    #[error("invalid data: field '{field}' is not a finite number")]
    NotFinite { field: &'static str },

    #[error("server error: {0}")]
    Unexpected(String),
}

impl IngestError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            IngestError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({
            "status": "error",
            "message": self.to_string(),
        }));
        (self.status_code(), body).into_response()
    }
}
