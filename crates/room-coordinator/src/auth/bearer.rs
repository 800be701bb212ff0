//! Bearer credential validation.
//!
//! Validates ES256 bearer tokens issued by the identity provider against a
//! fixed list of trusted public keys (primary first, then development keys).
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Only ES256 is accepted
//! - `exp` is required and validated with clock skew tolerance
//! - Generic error messages prevent information leakage

use crate::auth::claims::UserClaims;
use crate::errors::RcError;
use common::jwt::check_token_size;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use tracing::instrument;

const INVALID_TOKEN_MESSAGE: &str = "The access token is invalid or expired";

/// Validates bearer credentials and yields the caller's identity.
pub struct BearerValidator {
    keys: Vec<DecodingKey>,
    validation: Validation,
}

impl BearerValidator {
    /// Create a validator from already-decoded keys.
    pub fn new(keys: Vec<DecodingKey>, clock_skew_seconds: u64) -> Self {
        let mut validation = Validation::new(Algorithm::ES256);
        validation.validate_exp = true;
        validation.leeway = clock_skew_seconds;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp"]);

        Self { keys, validation }
    }

    /// Create a validator from PEM-encoded EC public keys.
    ///
    /// # Errors
    ///
    /// Returns `RcError::Configuration` if any key cannot be parsed.
    pub fn from_pem_keys(pems: &[String], clock_skew_seconds: u64) -> Result<Self, RcError> {
        let keys = pems
            .iter()
            .enumerate()
            .map(|(index, pem)| {
                DecodingKey::from_ec_pem(pem.as_bytes()).map_err(|e| {
                    RcError::Configuration(format!("public key #{index} is not an EC key: {e}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if keys.is_empty() {
            tracing::warn!(
                target: "rc.auth.bearer",
                "No bearer public keys configured; authenticated routes will reject every request"
            );
        }

        Ok(Self::new(keys, clock_skew_seconds))
    }

    /// Validate a bearer token and return its claims.
    ///
    /// # Errors
    ///
    /// - `RcError::InvalidToken` if the token is oversized, malformed, signed
    ///   by an untrusted key, or expired
    /// - `RcError::BadRequest` if the token is valid but carries no `name`
    #[instrument(skip_all, name = "rc.auth.bearer.validate")]
    pub fn validate(&self, token: &str) -> Result<UserClaims, RcError> {
        check_token_size(token).map_err(|e| {
            tracing::debug!(target: "rc.auth.bearer", error = ?e, "Token rejected before parsing");
            RcError::InvalidToken(INVALID_TOKEN_MESSAGE.to_string())
        })?;

        let mut last_error = None;
        for (index, key) in self.keys.iter().enumerate() {
            match decode::<UserClaims>(token, key, &self.validation) {
                Ok(data) => {
                    if data.claims.name.trim().is_empty() {
                        tracing::debug!(target: "rc.auth.bearer", "Token has no name claim");
                        return Err(RcError::BadRequest(
                            "name claim is required in JWT".to_string(),
                        ));
                    }
                    tracing::debug!(
                        target: "rc.auth.bearer",
                        key_index = index,
                        user = %data.claims.name,
                        "Token validated successfully"
                    );
                    return Ok(data.claims);
                }
                // Expiry and claim errors are independent of the key; stop.
                Err(e) if !matches!(e.kind(), ErrorKind::InvalidSignature) => {
                    tracing::debug!(target: "rc.auth.bearer", error = %e, "Token verification failed");
                    return Err(RcError::InvalidToken(INVALID_TOKEN_MESSAGE.to_string()));
                }
                Err(e) => last_error = Some(e),
            }
        }

        tracing::debug!(
            target: "rc.auth.bearer",
            error = ?last_error.map(|e| e.to_string()),
            keys = self.keys.len(),
            "Token not signed by any trusted key"
        );
        Err(RcError::InvalidToken(INVALID_TOKEN_MESSAGE.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use ring::rand::SystemRandom;
    use ring::signature::{EcdsaKeyPair, KeyPair, ECDSA_P256_SHA256_FIXED_SIGNING};
    use serde_json::json;

    struct TestKey {
        encoding: EncodingKey,
        decoding: DecodingKey,
    }

    fn test_key() -> TestKey {
        let rng = SystemRandom::new();
        let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, &rng).unwrap();
        let pair =
            EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, pkcs8.as_ref(), &rng)
                .unwrap();
        TestKey {
            encoding: EncodingKey::from_ec_der(pkcs8.as_ref()),
            decoding: DecodingKey::from_ec_der(pair.public_key().as_ref()),
        }
    }

    fn sign(key: &TestKey, claims: serde_json::Value) -> String {
        encode(&Header::new(Algorithm::ES256), &claims, &key.encoding).unwrap()
    }

    fn future_exp() -> i64 {
        chrono::Utc::now().timestamp() + 3600
    }

    #[test]
    fn test_valid_token() {
        let key = test_key();
        let validator = BearerValidator::new(vec![key.decoding.clone()], 300);

        let token = sign(&key, json!({"name": "alice", "exp": future_exp()}));
        let claims = validator.validate(&token).unwrap();
        assert_eq!(claims.user_id(), "alice");
    }

    #[test]
    fn test_second_key_accepted() {
        let primary = test_key();
        let dev = test_key();
        let validator =
            BearerValidator::new(vec![primary.decoding.clone(), dev.decoding.clone()], 300);

        let token = sign(&dev, json!({"name": "bob", "exp": future_exp()}));
        assert_eq!(validator.validate(&token).unwrap().user_id(), "bob");
    }

    #[test]
    fn test_untrusted_key_rejected() {
        let trusted = test_key();
        let other = test_key();
        let validator = BearerValidator::new(vec![trusted.decoding.clone()], 300);

        let token = sign(&other, json!({"name": "mallory", "exp": future_exp()}));
        assert!(matches!(
            validator.validate(&token),
            Err(RcError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        let key = test_key();
        let validator = BearerValidator::new(vec![key.decoding.clone()], 1);

        let exp = chrono::Utc::now().timestamp() - 600;
        let token = sign(&key, json!({"name": "alice", "exp": exp}));
        assert!(matches!(
            validator.validate(&token),
            Err(RcError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_missing_exp_rejected() {
        let key = test_key();
        let validator = BearerValidator::new(vec![key.decoding.clone()], 300);

        let token = sign(&key, json!({"name": "alice"}));
        assert!(matches!(
            validator.validate(&token),
            Err(RcError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_missing_name_is_bad_request() {
        let key = test_key();
        let validator = BearerValidator::new(vec![key.decoding.clone()], 300);

        let token = sign(&key, json!({"exp": future_exp()}));
        assert!(matches!(
            validator.validate(&token),
            Err(RcError::BadRequest(_))
        ));
    }

    #[test]
    fn test_hs256_token_rejected() {
        let key = test_key();
        let validator = BearerValidator::new(vec![key.decoding.clone()], 300);

        let token = encode(
            &Header::new(Algorithm::HS256),
            &json!({"name": "alice", "exp": future_exp()}),
            &EncodingKey::from_secret(b"shared"),
        )
        .unwrap();
        assert!(matches!(
            validator.validate(&token),
            Err(RcError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_oversized_token_rejected() {
        let validator = BearerValidator::new(vec![test_key().decoding], 300);
        let token = format!("{}.b.c", "a".repeat(common::jwt::MAX_JWT_SIZE_BYTES));
        assert!(matches!(
            validator.validate(&token),
            Err(RcError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_no_keys_rejects_everything() {
        let key = test_key();
        let validator = BearerValidator::new(Vec::new(), 300);
        let token = sign(&key, json!({"name": "alice", "exp": future_exp()}));
        assert!(matches!(
            validator.validate(&token),
            Err(RcError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_from_pem_keys_rejects_garbage() {
        let pems = vec!["-----BEGIN PUBLIC KEY-----\nAAAA\n-----END PUBLIC KEY-----".to_string()];
        assert!(matches!(
            BearerValidator::from_pem_keys(&pems, 300),
            Err(RcError::Configuration(_))
        ));
    }
}
