//! Authentication middleware for protected routes.
//!
//! Extracts the Bearer token from the Authorization header, validates it
//! against the trusted identity provider keys, and injects the caller's
//! claims into request extensions.

use crate::auth::{BearerValidator, UserClaims};
use crate::errors::RcError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    /// Bearer validator with the trusted public keys.
    pub validator: Arc<BearerValidator>,
}

/// Authentication middleware that validates bearer credentials.
///
/// # Authorization Header Format
///
/// ```text
/// Authorization: Bearer <token>
/// ```
///
/// # Response
///
/// - 401 with WWW-Authenticate if the token is missing or invalid
/// - 400 if the token is valid but names no user
/// - Otherwise continues with `UserClaims` in extensions
#[instrument(skip(state, req, next), name = "rc.middleware.auth")]
pub async fn require_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, RcError> {
    let auth_header = req
        .headers()
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            tracing::debug!(target: "rc.middleware.auth", "Missing Authorization header");
            RcError::InvalidToken("Missing Authorization header".to_string())
        })?;

    let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        tracing::debug!(target: "rc.middleware.auth", "Invalid Authorization header format");
        RcError::InvalidToken("Invalid Authorization header format".to_string())
    })?;

    let claims = state.validator.validate(token)?;

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

/// Extension trait for extracting claims from request.
pub trait ClaimsExt {
    /// Get the authenticated claims from request extensions.
    ///
    /// Returns `None` if auth middleware was not applied to this request.
    fn claims(&self) -> Option<&UserClaims>;
}

impl<B> ClaimsExt for axum::extract::Request<B> {
    fn claims(&self) -> Option<&UserClaims> {
        self.extensions().get::<UserClaims>()
    }
}
