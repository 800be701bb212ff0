//! JWT utilities shared across Room Coordinator components.
//!
//! This module provides:
//! - Size limits for DoS prevention
//! - Clock skew (leeway) constants for `exp` validation
//! - The body digest used by signed media-server notifications
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Generic error messages prevent information leakage
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{check_token_size, body_sha256_b64};
//!
//! check_token_size(token)?;
//! let digest = body_sha256_b64(&body);
//! ```

use base64::{engine::general_purpose::STANDARD, Engine};
use ring::{constant_time, digest};
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// JWTs larger than this are rejected BEFORE any base64 decoding or
/// signature verification.
///
/// - Bearer credentials from the identity provider are ~300 bytes
/// - Webhook authorization tokens are ~250 bytes
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

/// Default JWT clock skew tolerance (5 minutes).
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(300);

/// Maximum allowed JWT clock skew tolerance (10 minutes).
///
/// Guards against a misconfiguration that would accept long-expired tokens.
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during JWT and signed-payload validation.
///
/// Messages are intentionally generic; details are logged at debug level.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Token format is invalid (not three dot-separated segments).
    #[error("The access token is invalid or expired")]
    MalformedToken,

    /// Signed digest does not match the received payload.
    #[error("The payload signature does not match")]
    DigestMismatch,
}

// =============================================================================
// Functions
// =============================================================================

/// Reject oversized or structurally invalid tokens before any parsing.
///
/// # Errors
///
/// - `TokenTooLarge` - Token exceeds `MAX_JWT_SIZE_BYTES`
/// - `MalformedToken` - Token is not `header.payload.signature`
pub fn check_token_size(token: &str) -> Result<(), JwtValidationError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    let segments = token.split('.').count();
    if segments != 3 || token.split('.').any(str::is_empty) {
        tracing::debug!(
            target: "common.jwt",
            segments = segments,
            "Token rejected: invalid JWT format"
        );
        return Err(JwtValidationError::MalformedToken);
    }

    Ok(())
}

/// Base64 (standard alphabet, padded) SHA-256 digest of a request body.
///
/// This is the value the media server places in the `sha256` claim of a
/// webhook authorization token.
#[must_use]
pub fn body_sha256_b64(body: &[u8]) -> String {
    let hash = digest::digest(&digest::SHA256, body);
    STANDARD.encode(hash.as_ref())
}

/// Compare a signed digest claim against the digest of the received body.
///
/// # Errors
///
/// Returns `DigestMismatch` if the body was altered after signing.
pub fn verify_body_digest(signed_digest: &str, body: &[u8]) -> Result<(), JwtValidationError> {
    constant_time::verify_slices_are_equal(body_sha256_b64(body).as_bytes(), signed_digest.as_bytes())
        .map_err(|_| {
            tracing::debug!(target: "common.jwt", "Payload digest mismatch");
            JwtValidationError::DigestMismatch
        })
}

// =============================================================================
// Tests
// =============================================================================
