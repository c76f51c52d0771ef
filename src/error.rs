use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

pub const EMAIL_REQUIRED: &str = "Email is required";
pub const EMAIL_INVALID: &str = "Please enter a valid email address";
pub const EMAIL_EXISTS: &str = "Email id already exists";
pub const SUBSCRIBE_FALLBACK: &str = "Failed to subscribe. Please try again.";

/// Errors raised by the storage layer.
#[derive(Debug, Error)]
pub enum DbError {
    /// A unique constraint rejected the write.
    #[error("{0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Errors raised while loading a digest.
#[derive(Debug, Error)]
pub enum DigestError {
    /// No digest was published for the given date key.
    #[error("no digest published for {0}")]
    NotFound(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed digest: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Database(#[from] DbError),
}

/// Errors surfaced by the subscription form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// Bad local input; never reaches the network.
    #[error("{0}")]
    Validation(&'static str),

    /// The email is already subscribed.
    #[error("{0}")]
    Conflict(String),

    /// Network or server failure with no more specific classification.
    #[error("{0}")]
    Transport(String),

    #[error("this form has already been submitted")]
    AlreadySubmitted,
}

impl SubmitError {
    pub fn is_validation(&self) -> bool {
        matches!(self, SubmitError::Validation(_))
    }
}

/// JSON API error, rendered as `{ "error": message }`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Conflict(message) => ApiError::BadRequest(message),
            DbError::Sqlx(e) => {
                error!("Database failure: {}", e);
                ApiError::Internal(e.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_bad_request_shape() {
        let response = ApiError::BadRequest(EMAIL_EXISTS.to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!({ "error": EMAIL_EXISTS }));
    }

    #[tokio::test]
    async fn test_conflict_maps_to_bad_request() {
        let err: ApiError = DbError::Conflict(EMAIL_EXISTS.to_string()).into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_sqlx_failure_maps_to_internal() {
        let err: ApiError = DbError::Sqlx(sqlx::Error::RowNotFound).into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_json(response).await["error"].is_string());
    }

    #[test]
    fn test_submit_error_messages() {
        assert_eq!(SubmitError::Validation(EMAIL_REQUIRED).to_string(), EMAIL_REQUIRED);
        assert_eq!(
            SubmitError::Conflict(EMAIL_EXISTS.to_string()).to_string(),
            EMAIL_EXISTS
        );
        assert!(SubmitError::Validation(EMAIL_INVALID).is_validation());
        assert!(!SubmitError::Transport(SUBSCRIBE_FALLBACK.to_string()).is_validation());
    }
}
