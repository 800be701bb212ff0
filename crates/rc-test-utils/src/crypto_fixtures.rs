//! ES256 keypairs for bearer credential tests
//!
//! The service trusts identity provider keys given as PEM
//! SubjectPublicKeyInfo. ring exposes the raw uncompressed P-256 point, so
//! the SPKI document is assembled here from the fixed P-256 header.

use base64::engine::general_purpose;
use base64::Engine;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use ring::rand::SystemRandom;
use ring::signature::{EcdsaKeyPair, KeyPair, ECDSA_P256_SHA256_FIXED_SIGNING};
use thiserror::Error;

/// DER prefix of a P-256 SubjectPublicKeyInfo, up to the 65-byte point.
const P256_SPKI_PREFIX: [u8; 26] = [
    0x30, 0x59, 0x30, 0x13, 0x06, 0x07, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01, 0x06, 0x08,
    0x2a, 0x86, 0x48, 0xce, 0x3d, 0x03, 0x01, 0x07, 0x03, 0x42, 0x00,
];

/// Test fixture error type
#[derive(Error, Debug)]
pub enum FixtureError {
    #[error("Cryptographic operation failed: {0}")]
    Crypto(String),

    #[error("Token signing failed: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// An identity provider signing key.
pub struct TestBearerKey {
    pkcs8: Vec<u8>,
    public_key_pem: String,
}

impl TestBearerKey {
    /// Generate a fresh P-256 keypair.
    pub fn generate() -> Result<Self, FixtureError> {
        let rng = SystemRandom::new();
        let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, &rng)
            .map_err(|e| FixtureError::Crypto(format!("Failed to generate keypair: {:?}", e)))?;
        let key_pair =
            EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, pkcs8.as_ref(), &rng)
                .map_err(|e| FixtureError::Crypto(format!("Failed to parse keypair: {:?}", e)))?;

        let mut spki = P256_SPKI_PREFIX.to_vec();
        spki.extend_from_slice(key_pair.public_key().as_ref());

        Ok(Self {
            pkcs8: pkcs8.as_ref().to_vec(),
            public_key_pem: to_pem("PUBLIC KEY", &spki),
        })
    }

    /// Public key in PEM format, as the service expects it.
    pub fn public_key_pem(&self) -> &str {
        &self.public_key_pem
    }

    /// Sign arbitrary claims with ES256.
    pub fn sign_claims(&self, claims: &serde_json::Value) -> Result<String, FixtureError> {
        Ok(encode(
            &Header::new(Algorithm::ES256),
            claims,
            &EncodingKey::from_ec_der(&self.pkcs8),
        )?)
    }

    /// Sign a one-hour credential for `name`.
    pub fn sign_user(&self, name: &str) -> Result<String, FixtureError> {
        let exp = chrono::Utc::now().timestamp() + 3600;
        self.sign_claims(&serde_json::json!({ "name": name, "exp": exp }))
    }
}

fn to_pem(label: &str, der: &[u8]) -> String {
    let encoded = general_purpose::STANDARD.encode(der);
    let mut pem = format!("-----BEGIN {label}-----\n");
    for line in encoded.as_bytes().chunks(64) {
        pem.push_str(&String::from_utf8_lossy(line));
        pem.push('\n');
    }
    pem.push_str(&format!("-----END {label}-----\n"));
    pem
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{decode, DecodingKey, Validation};

    #[test]
    fn test_public_key_pem_verifies_signatures() {
        let key = TestBearerKey::generate().unwrap();
        assert!(key.public_key_pem().starts_with("-----BEGIN PUBLIC KEY-----\n"));

        let token = key.sign_user("alice").unwrap();
        let decoding = DecodingKey::from_ec_pem(key.public_key_pem().as_bytes()).unwrap();
        let data =
            decode::<serde_json::Value>(&token, &decoding, &Validation::new(Algorithm::ES256))
                .unwrap();
        assert_eq!(data.claims["name"], "alice");
    }

    #[test]
    fn test_keys_are_distinct() {
        let a = TestBearerKey::generate().unwrap();
        let b = TestBearerKey::generate().unwrap();
        assert_ne!(a.public_key_pem(), b.public_key_pem());
    }
}
