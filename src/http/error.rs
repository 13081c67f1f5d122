//! Mapping of service errors onto HTTP responses.
//!
//! Bodies are `{"detail": "..."}` with categorical text only. Anything that
//! would expose internals is logged and replaced by a generic message.

use axum::http::header::{RETRY_AFTER, WWW_AUTHENTICATE};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::observability::metrics;
use crate::security::sanitize::sanitize_error;
use crate::security::SecurityError;
use crate::service::ServiceError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// No usable `Authorization: Bearer` header.
    #[error("missing bearer token")]
    MissingToken,

    /// Blocking worker panicked or was cancelled.
    #[error("worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingToken => StatusCode::UNAUTHORIZED,
            ApiError::Worker(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Service(e) => match e {
                ServiceError::Security(s) => match s {
                    SecurityError::ExpiredToken
                    | SecurityError::MalformedOrForgedToken
                    | SecurityError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                    SecurityError::Forbidden => StatusCode::FORBIDDEN,
                    SecurityError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
                    SecurityError::EncryptionFailure
                    | SecurityError::InvalidKey(_)
                    | SecurityError::PasswordHashing
                    | SecurityError::TokenSigning => StatusCode::INTERNAL_SERVER_ERROR,
                },
                ServiceError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
                ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
                ServiceError::Conflict(_) => StatusCode::CONFLICT,
                ServiceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            },
        }
    }

    fn retry_after(&self) -> Option<u64> {
        match self {
            ApiError::Service(ServiceError::Security(SecurityError::RateLimitExceeded { retry_after_secs })) => {
                Some(*retry_after_secs)
            }
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = if status.is_server_error() {
            sanitize_error(&self).to_string()
        } else {
            self.to_string()
        };

        if matches!(self, ApiError::MissingToken) {
            metrics::record_auth_failure("missing");
        }

        let mut response = (status, Json(json!({ "detail": detail }))).into_response();
        let headers = response.headers_mut();
        if let Some(secs) = self.retry_after() {
            headers.insert(RETRY_AFTER, HeaderValue::from(secs));
        }
        if status == StatusCode::UNAUTHORIZED {
            headers.insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoreError;

    fn status_of(e: impl Into<ServiceError>) -> StatusCode {
        ApiError::Service(e.into()).into_response().status()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_of(SecurityError::ExpiredToken), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(SecurityError::MalformedOrForgedToken), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(SecurityError::InvalidCredentials), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(SecurityError::Forbidden), StatusCode::FORBIDDEN);
        assert_eq!(status_of(ServiceError::NotFound("decision")), StatusCode::NOT_FOUND);
        assert_eq!(status_of(ServiceError::Conflict("dup".into())), StatusCode::CONFLICT);
        assert_eq!(status_of(ServiceError::Validation("bad".into())), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(ApiError::MissingToken.into_response().status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_rate_limit_sets_retry_after() {
        let response = ApiError::Service(SecurityError::RateLimitExceeded { retry_after_secs: 42 }.into())
            .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(RETRY_AFTER).unwrap(), "42");
    }

    #[tokio::test]
    async fn test_server_errors_hide_detail() {
        let response = ApiError::Service(StoreError::Backend("/var/lib/secret.json: EIO".into()).into())
            .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("internal error"));
        assert!(!text.contains("secret"));
    }
}
