use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::{auth::password::HashingError, store::StoreError, validation::PayloadErrors};

/// Handler-level failure. Internal causes are logged, never sent to clients.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid payload")]
    Validation(PayloadErrors),
    #[error("invalid json input: {0}")]
    InvalidJson(String),
    #[error("{0}")]
    BadRequest(&'static str),
    #[error("{0}")]
    Conflict(&'static str),
    #[error("not authorized")]
    Forbidden,
    #[error("not found")]
    NotFound,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Hashing(#[from] HashingError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Validation(errs) => (StatusCode::BAD_REQUEST, json!({ "errors": errs })),
            ApiError::InvalidJson(_) => (StatusCode::BAD_REQUEST, json!({ "error": "invalid_json_input" })),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error_message": msg })),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, json!({ "error_message": msg })),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, json!({ "error": "not_authorized" })),
            ApiError::NotFound | ApiError::Store(StoreError::NotFound) => {
                (StatusCode::NOT_FOUND, json!({ "error": "not_found" }))
            }
            ApiError::Store(StoreError::Write(e)) => {
                error!(error = %e, "store write failed");
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": "db_write_error" }))
            }
            ApiError::Store(StoreError::Fetch(e)) => {
                error!(error = %e, "store fetch failed");
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": "db_fetch_error" }))
            }
            ApiError::Hashing(e) => {
                error!(error = %e, "credential hashing failed");
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": "hashing_error" }))
            }
        };
        (status, Json(body)).into_response()
    }
}

/// Unwrap a JSON body, turning axum's rejection into our own error shape.
pub fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    match body {
        Ok(Json(v)) => Ok(v),
        Err(rejection) => {
            tracing::warn!(error = %rejection.body_text(), "rejected json body");
            Err(ApiError::InvalidJson(rejection.body_text()))
        }
    }
}
