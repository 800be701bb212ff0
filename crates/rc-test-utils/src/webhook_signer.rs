//! Media server webhook signatures
//!
//! Produces the `Authorization` value the media server attaches to webhook
//! deliveries: an HS256 token from the API key whose `sha256` claim is the
//! base64 SHA-256 of the body.

use common::jwt::body_sha256_b64;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};

/// Sign a webhook body.
pub fn sign_webhook(api_key: &str, api_secret: &str, body: &[u8]) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = serde_json::json!({
        "iss": api_key,
        "nbf": now,
        "exp": now + 300,
        "sha256": body_sha256_b64(body),
    });
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(api_secret.as_bytes()),
    )
    .expect("HS256 signing of a JSON object cannot fail")
}
