//! Room Coordinator models.
//!
//! Contains the room/participant graph mirrored from the media server and
//! the request/response types of the HTTP surface.

use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fixed display offset for participant join timestamps (UTC+09:00).
pub const DISPLAY_OFFSET_SECONDS: i32 = 9 * 60 * 60;

/// Offset applied to every `joinedAt` timestamp.
pub fn display_offset() -> FixedOffset {
    FixedOffset::east_opt(DISPLAY_OFFSET_SECONDS).unwrap_or_else(|| Utc.fix())
}

/// Convert a unix timestamp (seconds) reported by the media server into the
/// display time zone. Out-of-range values collapse to the epoch.
pub fn joined_at_from_unix(seconds: i64) -> DateTime<FixedOffset> {
    DateTime::<Utc>::from_timestamp(seconds, 0)
        .unwrap_or_default()
        .with_timezone(&display_offset())
}

// ============================================================================
// Room State
// ============================================================================

/// A joined user session within a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    /// Unique-per-session identity (`{user}_{suffix}` for minted grants).
    pub identity: String,

    /// Display name.
    pub name: String,

    /// Join time, normalized to the display offset.
    pub joined_at: DateTime<FixedOffset>,

    /// Open attribute tags (e.g. screen-share signaling).
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,

    /// Whether the participant may publish media.
    pub can_publish: bool,
}

/// A conferencing room mirrored from the media server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    /// Room identifier; the media server's room name.
    pub room_id: String,

    /// Raw application metadata as reported by the media server.
    pub metadata: String,

    /// Whether attendees joining an existing room are muted by default.
    pub is_webinar: bool,

    /// Participants in stable insertion order.
    pub participants: Vec<Participant>,
}

impl Room {
    /// An empty room created ahead of its first join.
    pub fn empty(room_id: impl Into<String>, is_webinar: bool) -> Self {
        Self {
            room_id: room_id.into(),
            metadata: String::new(),
            is_webinar,
            participants: Vec::new(),
        }
    }
}

/// Structured form of the room metadata payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomMetadata {
    /// Application-defined status line.
    #[serde(default)]
    pub status: String,

    /// Webinar flag.
    #[serde(default)]
    pub is_webinar: bool,
}

impl RoomMetadata {
    /// Parse a metadata payload, rejecting malformed JSON.
    ///
    /// An empty (or whitespace-only) payload is the default metadata; rooms
    /// created outside this service carry none.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(raw)
    }

    /// Parse a metadata payload, falling back to the default on malformed
    /// input.
    pub fn parse_lenient(raw: &str) -> Self {
        Self::parse(raw).unwrap_or_else(|e| {
            tracing::warn!(target: "rc.models", error = %e, "Malformed room metadata, using defaults");
            Self::default()
        })
    }
}

// ============================================================================
// HTTP API Models
// ============================================================================

/// Health check response.
///
/// Returned by the `/api/health` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service health status ("healthy").
    pub status: String,

    /// Number of rooms currently mirrored.
    pub rooms: usize,

    /// Number of registered observers.
    pub observers: usize,
}

/// Generic `{"status": ...}` acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

/// Query parameters of `GET /api/token`.
///
/// `isWebinar` is kept as a raw string so an invalid value is reported as
/// a validation error instead of an extractor rejection.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenQuery {
    pub room: Option<String>,
    pub is_webinar: Option<String>,
}

/// Response of `GET /api/token`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Signed media server access grant.
    pub token: String,
}

/// One entry of a participant permission update.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantPermissionUpdate {
    pub identity: String,
    pub can_publish: bool,
}

/// Body of `PATCH /api/rooms/{roomId}/participants`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateParticipantsRequest {
    pub users: Vec<ParticipantPermissionUpdate>,
}
