//! Media server management API client.
//!
//! Speaks the media server's Twirp/JSON RoomService:
//! `POST {host}/twirp/livekit.RoomService/{Method}` with a short-lived admin
//! token signed by the API secret.
//!
//! # Security
//!
//! - Admin tokens live for `ADMIN_TOKEN_TTL_SECONDS` only
//! - Every call is bounded by the configured upstream timeout
//! - Errors are logged server-side with generic messages returned

use crate::auth::{SigningCredentials, VideoGrant};
use crate::errors::RcError;
use crate::models::{joined_at_from_unix, Participant};
use crate::observability::metrics;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{error, instrument, warn};

/// Lifetime of admin tokens used for management calls.
const ADMIN_TOKEN_TTL_SECONDS: u64 = 600;

const ROOM_SERVICE_PATH: &str = "/twirp/livekit.RoomService";

/// Room as reported by `ListRooms`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteRoom {
    pub name: String,

    #[serde(default)]
    pub metadata: String,
}

/// Participant permission bits as understood by the media server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantPermission {
    #[serde(default, alias = "canPublish")]
    pub can_publish: bool,

    #[serde(default, alias = "canSubscribe")]
    pub can_subscribe: bool,

    #[serde(default, alias = "canPublishData")]
    pub can_publish_data: bool,

    /// Needed for attribute updates (screen-share signaling).
    #[serde(default, alias = "canUpdateMetadata")]
    pub can_update_metadata: bool,
}

impl ParticipantPermission {
    /// Permission set for a participant whose publish bit is being changed.
    ///
    /// The media server replaces the whole block on update, so every bit a
    /// grant carries is restated here.
    pub fn with_publish(can_publish: bool) -> Self {
        Self {
            can_publish,
            can_subscribe: true,
            can_publish_data: true,
            can_update_metadata: true,
        }
    }
}

/// Participant as reported by `ListParticipants` and webhook payloads.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteParticipant {
    pub identity: String,

    #[serde(default)]
    pub name: String,

    /// Unix seconds; protobuf JSON encodes it as a string.
    #[serde(default, alias = "joinedAt", deserialize_with = "lenient_i64")]
    pub joined_at: i64,

    #[serde(default)]
    pub attributes: BTreeMap<String, String>,

    #[serde(default)]
    pub permission: Option<ParticipantPermission>,
}

impl RemoteParticipant {
    /// Convert to the local model. An absent permission block means the
    /// media server's default, which allows publishing.
    pub fn into_participant(self) -> Participant {
        Participant {
            can_publish: self.permission.as_ref().map_or(true, |p| p.can_publish),
            identity: self.identity,
            name: self.name,
            joined_at: joined_at_from_unix(self.joined_at),
            attributes: self.attributes,
        }
    }
}

/// Accept an integer encoded either as a JSON number or as a decimal string.
pub(crate) fn lenient_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IntOrString {
        Int(i64),
        Str(String),
    }

    match IntOrString::deserialize(deserializer)? {
        IntOrString::Int(value) => Ok(value),
        IntOrString::Str(s) if s.is_empty() => Ok(0),
        IntOrString::Str(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

#[derive(Deserialize)]
struct ListRoomsResponse {
    #[serde(default)]
    rooms: Vec<RemoteRoom>,
}

#[derive(Deserialize)]
struct ListParticipantsResponse {
    #[serde(default)]
    participants: Vec<RemoteParticipant>,
}

/// Trait for media server operations (enables mocking).
#[async_trait::async_trait]
pub trait MediaServerClient: Send + Sync {
    /// List all active rooms.
    async fn list_rooms(&self) -> Result<Vec<RemoteRoom>, RcError>;

    /// List the participants of one room.
    async fn list_participants(&self, room: &str) -> Result<Vec<RemoteParticipant>, RcError>;

    /// Change a participant's permissions.
    async fn update_participant_permission(
        &self,
        room: &str,
        identity: &str,
        permission: &ParticipantPermission,
    ) -> Result<(), RcError>;
}

/// HTTP client for the media server RoomService.
#[derive(Clone)]
pub struct LiveKitClient {
    /// HTTP client with configured timeouts.
    client: Client,

    /// Base URL of the media server.
    host: String,

    /// Admin signing credentials; calls fail when absent.
    credentials: Option<SigningCredentials>,
}

impl LiveKitClient {
    /// Create a new media server client.
    ///
    /// # Errors
    ///
    /// Returns `RcError::Internal` if the HTTP client cannot be built.
    pub fn new(
        host: String,
        credentials: Option<SigningCredentials>,
        timeout: Duration,
    ) -> Result<Self, RcError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| {
                error!(target: "rc.services.livekit", error = %e, "Failed to build HTTP client");
                RcError::Internal
            })?;

        Ok(Self {
            client,
            host: host.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn admin_token(&self, room: Option<&str>) -> Result<String, RcError> {
        let credentials = self.credentials.as_ref().ok_or_else(|| {
            RcError::Upstream("media server API credentials are not configured".to_string())
        })?;
        let video = VideoGrant {
            room_list: true,
            room_admin: true,
            room: room.map(str::to_string),
            ..VideoGrant::default()
        };
        credentials.sign(None, video, ADMIN_TOKEN_TTL_SECONDS)
    }

    /// Invoke one RoomService method and decode its response.
    async fn call<Req, Resp>(
        &self,
        operation: &'static str,
        method: &str,
        room: Option<&str>,
        body: &Req,
    ) -> Result<Resp, RcError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let token = self.admin_token(room)?;
        let url = format!("{}{}/{}", self.host, ROOM_SERVICE_PATH, method);
        let start = Instant::now();

        let result = self.send(&url, &token, body).await;
        let status = if result.is_ok() { "success" } else { "error" };
        metrics::record_upstream_request(operation, status, start.elapsed());

        let response = result?;
        response.json::<Resp>().await.map_err(|e| {
            error!(target: "rc.services.livekit", error = %e, method = %method, "Failed to parse media server response");
            RcError::Upstream(format!("{method}: malformed response"))
        })
    }

    async fn send<Req: Serialize + Sync>(
        &self,
        url: &str,
        token: &str,
        body: &Req,
    ) -> Result<reqwest::Response, RcError> {
        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    warn!(target: "rc.services.livekit", url = %url, "Media server request timed out");
                    RcError::Upstream("media server request timed out".to_string())
                } else {
                    warn!(target: "rc.services.livekit", error = %e, "Media server request failed");
                    RcError::Upstream("media server is unreachable".to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            warn!(
                target: "rc.services.livekit",
                status = %status,
                body = %body,
                "Media server returned an error"
            );
            Err(RcError::Upstream(format!(
                "media server answered {}",
                status.as_u16()
            )))
        }
    }
}

#[async_trait::async_trait]
impl MediaServerClient for LiveKitClient {
    #[instrument(skip_all, name = "rc.livekit.list_rooms")]
    async fn list_rooms(&self) -> Result<Vec<RemoteRoom>, RcError> {
        let response: ListRoomsResponse = self
            .call("list_rooms", "ListRooms", None, &serde_json::json!({}))
            .await?;
        Ok(response.rooms)
    }

    #[instrument(skip(self), name = "rc.livekit.list_participants")]
    async fn list_participants(&self, room: &str) -> Result<Vec<RemoteParticipant>, RcError> {
        let response: ListParticipantsResponse = self
            .call(
                "list_participants",
                "ListParticipants",
                Some(room),
                &serde_json::json!({ "room": room }),
            )
            .await?;
        Ok(response.participants)
    }

    #[instrument(skip(self, permission), name = "rc.livekit.update_participant")]
    async fn update_participant_permission(
        &self,
        room: &str,
        identity: &str,
        permission: &ParticipantPermission,
    ) -> Result<(), RcError> {
        let _: serde_json::Value = self
            .call(
                "update_participant",
                "UpdateParticipant",
                Some(room),
                &serde_json::json!({
                    "room": room,
                    "identity": identity,
                    "permission": permission,
                }),
            )
            .await?;
        Ok(())
    }
}

/// Mock media server client module for testing.
///
/// This module provides mock implementations of the media server client for
/// use in tests.
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Mock media server returning a fixed listing.
    #[derive(Default)]
    pub struct MockMediaServerClient {
        rooms: Vec<RemoteRoom>,
        participants: HashMap<String, Vec<RemoteParticipant>>,
        fail_list_rooms: bool,
        fail_list_participants: bool,
        fail_updates: bool,
        updates: Mutex<Vec<(String, String, ParticipantPermission)>>,
        call_count: AtomicUsize,
    }

    impl MockMediaServerClient {
        /// Mock with no rooms.
        pub fn empty() -> Self {
            Self::default()
        }

        /// Add a room with its participants to the listing.
        pub fn with_room(mut self, room: RemoteRoom, participants: Vec<RemoteParticipant>) -> Self {
            self.participants.insert(room.name.clone(), participants);
            self.rooms.push(room);
            self
        }

        /// Every `list_rooms` call fails.
        pub fn failing() -> Self {
            Self {
                fail_list_rooms: true,
                ..Self::default()
            }
        }

        /// `list_participants` fails for every room.
        pub fn failing_participants(mut self) -> Self {
            self.fail_list_participants = true;
            self
        }

        /// `update_participant_permission` fails.
        pub fn failing_updates(mut self) -> Self {
            self.fail_updates = true;
            self
        }

        /// Number of calls made.
        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }

        /// Permission updates received, in order.
        pub fn updates(&self) -> Vec<(String, String, ParticipantPermission)> {
            self.updates
                .lock()
                .map(|u| u.clone())
                .unwrap_or_default()
        }
    }

    #[async_trait::async_trait]
    impl MediaServerClient for MockMediaServerClient {
        async fn list_rooms(&self) -> Result<Vec<RemoteRoom>, RcError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            if self.fail_list_rooms {
                return Err(RcError::Upstream("Mock media server error".to_string()));
            }
            Ok(self.rooms.clone())
        }

        async fn list_participants(&self, room: &str) -> Result<Vec<RemoteParticipant>, RcError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            if self.fail_list_participants {
                return Err(RcError::Upstream("Mock media server error".to_string()));
            }
            Ok(self.participants.get(room).cloned().unwrap_or_default())
        }

        async fn update_participant_permission(
            &self,
            room: &str,
            identity: &str,
            permission: &ParticipantPermission,
        ) -> Result<(), RcError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            if self.fail_updates {
                return Err(RcError::Upstream("Mock media server error".to_string()));
            }
            if let Ok(mut updates) = self.updates.lock() {
                updates.push((room.to_string(), identity.to_string(), permission.clone()));
            }
            Ok(())
        }
    }
}
