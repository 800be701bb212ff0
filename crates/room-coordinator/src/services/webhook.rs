//! Media server webhook verification and parsing.
//!
//! The media server signs every notification with an HS256 token in the
//! `Authorization` header. The token is issued by the API key, signed with
//! the API secret, and carries the base64 SHA-256 of the raw body in its
//! `sha256` claim. The body is verified before it is parsed.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing
//! - Issuer must equal the configured API key
//! - Body digest comparison is constant-time (see `common::jwt`)

use crate::auth::SigningCredentials;
use crate::errors::RcError;
use crate::services::livekit_client::{RemoteParticipant, RemoteRoom};
use common::jwt::{check_token_size, verify_body_digest};
use common::secret::ExposeSecret;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tracing::{debug, instrument};

/// Content types the media server uses for notifications.
const ACCEPTED_CONTENT_TYPES: [&str; 2] = ["application/webhook+json", "application/json"];

const INVALID_SIGNATURE_MESSAGE: &str = "Invalid webhook signature";

/// Claims of a webhook signature token.
#[derive(Debug, Deserialize)]
struct WebhookClaims {
    #[serde(default)]
    sha256: String,
}

/// Reject anything but the webhook JSON content types.
///
/// Parameters such as `charset` are ignored.
pub fn check_content_type(content_type: Option<&str>) -> Result<(), RcError> {
    let media_type = content_type
        .and_then(|value| value.split(';').next())
        .map(str::trim)
        .unwrap_or_default();

    if ACCEPTED_CONTENT_TYPES
        .iter()
        .any(|accepted| accepted.eq_ignore_ascii_case(media_type))
    {
        Ok(())
    } else {
        debug!(target: "rc.services.webhook", content_type = %media_type, "Unsupported webhook content type");
        Err(RcError::UnsupportedMediaType(
            "Unsupported Content-Type".to_string(),
        ))
    }
}

/// Verifies webhook signatures with the media server API credentials.
#[derive(Clone)]
pub struct WebhookVerifier {
    credentials: Option<SigningCredentials>,
}

impl WebhookVerifier {
    pub fn new(credentials: Option<SigningCredentials>) -> Self {
        Self { credentials }
    }

    /// Verify the signature header against the raw body.
    ///
    /// # Errors
    ///
    /// - `RcError::Configuration` if no API credentials are configured
    /// - `RcError::InvalidToken` if the header is missing, the token does not
    ///   verify, or the body digest does not match
    #[instrument(skip_all, name = "rc.webhook.verify")]
    pub fn verify(&self, authorization: Option<&str>, body: &[u8]) -> Result<(), RcError> {
        let credentials = self.credentials.as_ref().ok_or_else(|| {
            RcError::Configuration("webhook received but no API credentials are set".to_string())
        })?;

        let token = authorization
            .map(|value| value.strip_prefix("Bearer ").unwrap_or(value).trim())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                debug!(target: "rc.services.webhook", "Webhook without Authorization header");
                RcError::InvalidToken(INVALID_SIGNATURE_MESSAGE.to_string())
            })?;

        check_token_size(token).map_err(|e| {
            debug!(target: "rc.services.webhook", error = ?e, "Webhook token rejected before parsing");
            RcError::InvalidToken(INVALID_SIGNATURE_MESSAGE.to_string())
        })?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[credentials.api_key.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss"]);
        validation.validate_aud = false;

        let key = DecodingKey::from_secret(credentials.api_secret.expose_secret().as_bytes());
        let data = decode::<WebhookClaims>(token, &key, &validation).map_err(|e| {
            debug!(target: "rc.services.webhook", error = %e, "Webhook token verification failed");
            RcError::InvalidToken(INVALID_SIGNATURE_MESSAGE.to_string())
        })?;

        verify_body_digest(&data.claims.sha256, body).map_err(|e| {
            debug!(target: "rc.services.webhook", error = %e, "Webhook body digest mismatch");
            RcError::InvalidToken(INVALID_SIGNATURE_MESSAGE.to_string())
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawWebhookEvent {
    #[serde(default)]
    event: String,

    #[serde(default)]
    room: Option<RemoteRoom>,

    #[serde(default)]
    participant: Option<RemoteParticipant>,
}

/// A parsed media server notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    ParticipantJoined {
        room: RemoteRoom,
        participant: RemoteParticipant,
    },
    ParticipantLeft {
        room: String,
        identity: String,
        name: String,
    },
    RoomStarted {
        room: RemoteRoom,
    },
    RoomFinished {
        room: String,
    },
    TrackPublished {
        room: String,
        participant: RemoteParticipant,
    },
    /// Any event kind this service does not act on.
    Unknown {
        event: String,
    },
}

impl WebhookEvent {
    /// Parse a verified notification body.
    ///
    /// # Errors
    ///
    /// Returns `RcError::BadRequest` if the body is not valid JSON or an
    /// event lacks the room or participant it needs.
    pub fn parse(body: &[u8]) -> Result<Self, RcError> {
        let raw: RawWebhookEvent = serde_json::from_slice(body).map_err(|e| {
            debug!(target: "rc.services.webhook", error = %e, "Malformed webhook payload");
            RcError::BadRequest("Invalid Webhook payload".to_string())
        })?;

        let event = match raw.event.as_str() {
            "participant_joined" => WebhookEvent::ParticipantJoined {
                room: require_room(raw.room)?,
                participant: require_participant(raw.participant)?,
            },
            "participant_left" => {
                let participant = require_participant(raw.participant)?;
                WebhookEvent::ParticipantLeft {
                    room: require_room(raw.room)?.name,
                    identity: participant.identity,
                    name: participant.name,
                }
            }
            "room_started" => WebhookEvent::RoomStarted {
                room: require_room(raw.room)?,
            },
            "room_finished" => WebhookEvent::RoomFinished {
                room: require_room(raw.room)?.name,
            },
            "track_published" => WebhookEvent::TrackPublished {
                room: require_room(raw.room)?.name,
                participant: require_participant(raw.participant)?,
            },
            _ => WebhookEvent::Unknown { event: raw.event },
        };

        Ok(event)
    }

    /// Metric label for this event kind.
    pub fn kind(&self) -> &'static str {
        match self {
            WebhookEvent::ParticipantJoined { .. } => "participant_joined",
            WebhookEvent::ParticipantLeft { .. } => "participant_left",
            WebhookEvent::RoomStarted { .. } => "room_started",
            WebhookEvent::RoomFinished { .. } => "room_finished",
            WebhookEvent::TrackPublished { .. } => "track_published",
            WebhookEvent::Unknown { .. } => "unknown",
        }
    }
}

fn require_room(room: Option<RemoteRoom>) -> Result<RemoteRoom, RcError> {
    room.filter(|r| !r.name.is_empty())
        .ok_or_else(|| RcError::BadRequest("Webhook event is missing its room".to_string()))
}

fn require_participant(participant: Option<RemoteParticipant>) -> Result<RemoteParticipant, RcError> {
    participant
        .filter(|p| !p.identity.is_empty())
        .ok_or_else(|| RcError::BadRequest("Webhook event is missing its participant".to_string()))
}
