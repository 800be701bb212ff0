//! Credential Issuer.
//!
//! Mints media server access grants for users joining a room. The publish
//! permission depends on the room's current state:
//!
//! - room does not exist yet: the caller creates it and may publish
//! - room exists and the caller asked for webinar semantics: listen-only
//! - room exists otherwise: may publish
//!
//! Every grant may publish data and update its own metadata. Each grant gets
//! a fresh identity `{user}_{8 hex chars}`, so one user joining twice shows up
//! as two participants.

use crate::auth::{SigningCredentials, VideoGrant};
use crate::errors::RcError;
use crate::models::Room;
use crate::observability::metrics;
use crate::state::{Broadcaster, RoomStateStore};
use ring::rand::{SecureRandom, SystemRandom};
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Random bytes in an identity suffix.
const IDENTITY_SUFFIX_BYTES: usize = 4;

/// A freshly minted access grant.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Signed grant.
    pub token: String,

    /// Identity the grant was minted for.
    pub identity: String,

    /// Publish permission granted.
    pub can_publish: bool,

    /// Whether this request created the room.
    pub room_created: bool,
}

/// Issues access grants against current room state.
pub struct CredentialIssuer {
    store: Arc<RoomStateStore>,
    broadcaster: Arc<Broadcaster>,
    credentials: Option<SigningCredentials>,
    ttl_seconds: u64,
    rng: SystemRandom,
}

impl CredentialIssuer {
    pub fn new(
        store: Arc<RoomStateStore>,
        broadcaster: Arc<Broadcaster>,
        credentials: Option<SigningCredentials>,
        ttl_seconds: u64,
    ) -> Self {
        Self {
            store,
            broadcaster,
            credentials,
            ttl_seconds,
            rng: SystemRandom::new(),
        }
    }

    /// Mint a grant for `user_id` to join `room`.
    ///
    /// # Errors
    ///
    /// - `RcError::BadRequest` if `room` is empty
    /// - `RcError::Configuration` if no signing credentials are configured
    /// - `RcError::Internal` if randomness or signing fails
    #[instrument(skip_all, name = "rc.credentials.issue", fields(room = %room, user = %user_id))]
    pub async fn issue_token(
        &self,
        room: &str,
        user_id: &str,
        is_webinar: bool,
    ) -> Result<IssuedToken, RcError> {
        if room.trim().is_empty() {
            return Err(RcError::BadRequest(
                "room query parameter is required".to_string(),
            ));
        }

        let credentials = self.credentials.as_ref().ok_or_else(|| {
            RcError::Configuration("API key and secret must be set".to_string())
        })?;

        let identity = self.mint_identity(user_id)?;

        // Check and create under one store lock; two first joiners cannot
        // both see the room as new.
        let existed = self
            .store
            .get_or_create_room(Room::empty(room, is_webinar))
            .await;
        let can_publish = !(existed && is_webinar);

        let video = VideoGrant {
            room_join: true,
            room: Some(room.to_string()),
            can_publish: Some(can_publish),
            can_subscribe: Some(true),
            can_publish_data: Some(true),
            can_update_own_metadata: Some(true),
            ..VideoGrant::default()
        };
        let signed = credentials.sign(Some((identity.as_str(), user_id)), video, self.ttl_seconds);

        // The room is in the store whether or not signing worked; observers
        // must see it either way.
        if !existed {
            self.broadcaster.broadcast_current_state().await;
        }
        let token = signed?;

        metrics::record_token_issued(can_publish);
        info!(
            target: "rc.services.credentials",
            identity = %identity,
            can_publish = can_publish,
            room_created = !existed,
            "Access token issued"
        );

        Ok(IssuedToken {
            token,
            identity,
            can_publish,
            room_created: !existed,
        })
    }

    fn mint_identity(&self, user_id: &str) -> Result<String, RcError> {
        let mut suffix = [0u8; IDENTITY_SUFFIX_BYTES];
        self.rng.fill(&mut suffix).map_err(|_| {
            error!(target: "rc.services.credentials", "Failed to generate identity suffix");
            RcError::Internal
        })?;
        Ok(format!("{}_{}", user_id, hex::encode(suffix)))
    }
}
