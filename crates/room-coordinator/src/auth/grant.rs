//! Media server grant tokens.
//!
//! The media server accepts HS256 tokens signed with the shared API secret
//! and issued by the API key. The same format carries participant access
//! grants (`roomJoin`) and the admin grants used for management calls
//! (`roomList`, `roomAdmin`).

use crate::errors::RcError;
use common::secret::{ExposeSecret, SecretString};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

/// Permission set of a media server token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoGrant {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub room_join: bool,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub room_list: bool,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub room_admin: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_publish: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_subscribe: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_publish_data: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_update_own_metadata: Option<bool>,
}

/// Claims of a media server token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantClaims {
    /// API key.
    pub iss: String,

    /// Participant identity (absent for admin tokens).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Participant display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub nbf: i64,
    pub exp: i64,

    pub video: VideoGrant,
}

/// API key and secret pair used to sign and verify media server tokens.
#[derive(Clone)]
pub struct SigningCredentials {
    pub api_key: String,
    pub api_secret: SecretString,
}

impl std::fmt::Debug for SigningCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningCredentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .finish()
    }
}

impl SigningCredentials {
    /// Build credentials when both halves are configured.
    pub fn from_parts(api_key: Option<String>, api_secret: Option<SecretString>) -> Option<Self> {
        match (api_key, api_secret) {
            (Some(api_key), Some(api_secret)) => Some(Self {
                api_key,
                api_secret,
            }),
            _ => None,
        }
    }

    /// Sign a grant valid for `ttl_seconds` from now.
    ///
    /// # Errors
    ///
    /// Returns `RcError::Internal` if encoding fails.
    pub fn sign(
        &self,
        subject: Option<(&str, &str)>,
        video: VideoGrant,
        ttl_seconds: u64,
    ) -> Result<String, RcError> {
        let now = chrono::Utc::now().timestamp();
        let ttl = i64::try_from(ttl_seconds).unwrap_or(i64::MAX);
        let claims = GrantClaims {
            iss: self.api_key.clone(),
            sub: subject.map(|(identity, _)| identity.to_string()),
            name: subject.map(|(_, name)| name.to_string()),
            nbf: now,
            exp: now.saturating_add(ttl),
            video,
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.api_secret.expose_secret().as_bytes()),
        )
        .map_err(|e| {
            tracing::error!(target: "rc.auth.grant", error = %e, "Failed to sign grant");
            RcError::Internal
        })
    }
}
