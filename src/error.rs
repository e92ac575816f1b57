use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::{auth::AuthError, database::DatabaseError, provider::ProviderError};

pub const MISSING_FIELDS: &str = "Missing or empty fields";

/// Failure taxonomy shared by every route. All kinds render as `{result: false, error}`.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Upstream(String),
    #[error("Internal Server Error")]
    Internal(String),
}

impl ApiError {
    pub fn missing_fields() -> Self {
        ApiError::Validation(MISSING_FIELDS.to_string())
    }

    fn body(&self) -> Json<FailureBody> {
        if let ApiError::Internal(detail) = self {
            tracing::error!("Request failed: {}", detail);
        }
        Json(FailureBody {
            result: false,
            error: self.to_string(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct FailureBody {
    pub result: bool,
    pub error: String,
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::Duplicate(message) => ApiError::Conflict(message),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Api(message) => ApiError::Upstream(message),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (StatusCode::OK, self.body()).into_response()
    }
}

/// Same envelope, but upstream and internal failures carry a non-200 status.
#[derive(Debug)]
pub struct Strict(pub ApiError);

impl From<ApiError> for Strict {
    fn from(err: ApiError) -> Self {
        Strict(err)
    }
}

impl IntoResponse for Strict {
    fn into_response(self) -> Response {
        let status = match self.0 {
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::OK,
        };
        (status, self.0.body()).into_response()
    }
}
