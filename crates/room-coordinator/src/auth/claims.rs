//! Bearer credential claims.
//!
//! The identity provider signs the user's display id into the `name` claim;
//! that value becomes the user id of minted access grants.

use serde::{Deserialize, Serialize};

/// Claims extracted from a validated bearer credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserClaims {
    /// User id. Must be present and non-empty.
    #[serde(default)]
    pub name: String,

    /// Expiration timestamp (Unix epoch seconds). Required.
    pub exp: i64,
}

impl UserClaims {
    /// User id for access grants and logs.
    pub fn user_id(&self) -> &str {
        &self.name
    }
}
