use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::QueryRejection;
use recipebook_db::CoreError;
use recipebook_types::api::ErrorBody;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Authentication credentials were not provided")]
    Unauthorized,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Core(core) => {
                let status = match core {
                    CoreError::Validation(_) => StatusCode::BAD_REQUEST,
                    CoreError::Conflict(_) => StatusCode::CONFLICT,
                    CoreError::NotFound(_) => StatusCode::NOT_FOUND,
                    CoreError::Forbidden(_) => StatusCode::FORBIDDEN,
                    CoreError::Store(_) | CoreError::Internal(_) => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, core.kind())
            }
            ApiError::Unauthorized | ApiError::InvalidToken => {
                (StatusCode::UNAUTHORIZED, "unauthorized")
            }
            ApiError::MalformedPayload(_) => (StatusCode::BAD_REQUEST, "validation"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::MalformedPayload(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::MalformedPayload(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::MalformedPayload(rejection.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {}", self);
            ApiError::Internal.to_string()
        } else {
            warn!("Request rejected ({}): {}", status, self);
            self.to_string()
        };

        (
            status,
            Json(ErrorBody {
                kind: kind.to_string(),
                message,
            }),
        )
            .into_response()
    }
}
