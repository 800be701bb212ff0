//! Room Coordinator error types.
//!
//! All errors map to appropriate HTTP status codes via the `IntoResponse` impl.
//! Upstream and configuration failures return generic messages to clients;
//! the actual cause is logged server-side.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Room Coordinator error type.
///
/// Maps to appropriate HTTP status codes:
/// - BadRequest: 400 Bad Request
/// - InvalidToken: 401 Unauthorized
/// - Forbidden: 403 Forbidden
/// - NotFound: 404 Not Found
/// - UnsupportedMediaType: 415 Unsupported Media Type
/// - Configuration, Internal: 500 Internal Server Error
/// - Upstream: 503 Service Unavailable
#[derive(Debug, Error)]
pub enum RcError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal server error")]
    Internal,
}

impl RcError {
    /// Returns the HTTP status code for this error (for metrics recording).
    pub fn status_code(&self) -> u16 {
        match self {
            RcError::BadRequest(_) => 400,
            RcError::InvalidToken(_) => 401,
            RcError::Forbidden(_) => 403,
            RcError::NotFound(_) => 404,
            RcError::UnsupportedMediaType(_) => 415,
            RcError::Configuration(_) | RcError::Internal => 500,
            RcError::Upstream(_) => 503,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for RcError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            RcError::BadRequest(reason) => (StatusCode::BAD_REQUEST, reason.clone()),
            RcError::InvalidToken(reason) => (StatusCode::UNAUTHORIZED, reason.clone()),
            RcError::Forbidden(reason) => (StatusCode::FORBIDDEN, reason.clone()),
            RcError::NotFound(resource) => (StatusCode::NOT_FOUND, resource.clone()),
            RcError::UnsupportedMediaType(reason) => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, reason.clone())
            }
            RcError::Upstream(reason) => {
                // Log actual reason server-side
                tracing::warn!(target: "rc.upstream", reason = %reason, "Upstream call failed");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Media server temporarily unavailable".to_string(),
                )
            }
            RcError::Configuration(reason) => {
                tracing::error!(target: "rc.config", reason = %reason, "Service misconfigured");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Service is not configured to issue credentials".to_string(),
                )
            }
            RcError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An internal error occurred".to_string(),
            ),
        };

        let mut response = (status, Json(ErrorResponse { error: message })).into_response();

        // Add WWW-Authenticate header for 401 responses
        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) =
                "Bearer realm=\"room-coordinator\", error=\"invalid_token\"".parse()
            {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;

    async fn read_body_json(body: Body) -> serde_json::Value {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_display() {
        assert_eq!(
            RcError::BadRequest("room is required".to_string()).to_string(),
            "Bad request: room is required"
        );
        assert_eq!(
            RcError::Upstream("timeout".to_string()).to_string(),
            "Upstream error: timeout"
        );
        assert_eq!(RcError::Internal.to_string(), "Internal server error");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(RcError::BadRequest("x".to_string()).status_code(), 400);
        assert_eq!(RcError::InvalidToken("x".to_string()).status_code(), 401);
        assert_eq!(RcError::Forbidden("x".to_string()).status_code(), 403);
        assert_eq!(RcError::NotFound("x".to_string()).status_code(), 404);
        assert_eq!(
            RcError::UnsupportedMediaType("x".to_string()).status_code(),
            415
        );
        assert_eq!(RcError::Configuration("x".to_string()).status_code(), 500);
        assert_eq!(RcError::Internal.status_code(), 500);
        assert_eq!(RcError::Upstream("x".to_string()).status_code(), 503);
    }

    #[tokio::test]
    async fn test_into_response_bad_request() {
        let response = RcError::BadRequest("room query parameter is required".to_string())
            .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"], "room query parameter is required");
    }

    #[tokio::test]
    async fn test_into_response_invalid_token() {
        let response = RcError::InvalidToken("token expired".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let www_auth = response
            .headers()
            .get("WWW-Authenticate")
            .unwrap()
            .to_str()
            .unwrap();
        assert!(www_auth.contains("Bearer realm=\"room-coordinator\""));

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"], "token expired");
    }

    #[tokio::test]
    async fn test_into_response_unsupported_media_type() {
        let response =
            RcError::UnsupportedMediaType("Unsupported Content-Type".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert!(response.headers().get("WWW-Authenticate").is_none());
    }

    #[tokio::test]
    async fn test_into_response_upstream_is_generic() {
        let response =
            RcError::Upstream("connection refused to 10.0.0.5:7880".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"], "Media server temporarily unavailable");
    }

    #[tokio::test]
    async fn test_into_response_configuration_is_generic() {
        let response =
            RcError::Configuration("LIVEKIT_API_SECRET not set".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body_json = read_body_json(response.into_body()).await;
        assert!(!body_json["error"]
            .as_str()
            .unwrap()
            .contains("LIVEKIT_API_SECRET"));
    }

    #[tokio::test]
    async fn test_into_response_not_found() {
        let response = RcError::NotFound("Room not found".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"], "Room not found");
    }
}
