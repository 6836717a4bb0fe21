//! Mapping from domain errors to HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::common::CleanseError;

#[derive(Debug)]
pub enum ApiError {
    /// No usable owner identity on the request
    Unauthorized,
    Cleanse(CleanseError),
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl From<CleanseError> for ApiError {
    fn from(err: CleanseError) -> Self {
        ApiError::Cleanse(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Cleanse(err) => match err {
                CleanseError::Validation(_) => StatusCode::BAD_REQUEST,
                CleanseError::NotFound(_) => StatusCode::NOT_FOUND,
                CleanseError::Forbidden => StatusCode::FORBIDDEN,
                CleanseError::Conflict(_) => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Unauthorized => "missing or invalid owner id".to_string(),
            ApiError::Cleanse(err) if status.is_server_error() => {
                error!(error = %err, "request failed");
                "internal server error".to_string()
            }
            ApiError::Cleanse(err) => err.to_string(),
        };
        (status, Json(ErrorBody { message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::from(CleanseError::Validation("x".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(CleanseError::NotFound("x".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(ApiError::from(CleanseError::Forbidden).status(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::from(CleanseError::Store("x".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
    }
}
