//! Resynchronizer.
//!
//! Pulls the full room and participant listing from the media server and
//! replaces the store's contents. Runs at startup and as a periodic recovery
//! path; incremental webhook events are the steady-state path.
//!
//! The pull is fail-closed: any listing error or any room whose metadata
//! cannot be parsed aborts the whole resync and leaves the store untouched.
//! The store lock is never held across a media server call; the new state is
//! built off to the side and swapped in with one `replace_all`.

use crate::errors::RcError;
use crate::models::{Room, RoomMetadata};
use crate::observability::metrics;
use crate::services::livekit_client::MediaServerClient;
use crate::state::RoomStateStore;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{info, instrument, warn};

/// Why a resync was abandoned.
#[derive(Debug, Error)]
pub enum ResyncError {
    #[error("media server listing failed: {0}")]
    Upstream(#[from] RcError),

    #[error("room {room} has malformed metadata: {source}")]
    MalformedMetadata {
        room: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Rebuilds the room state store from the media server.
pub struct Resynchronizer {
    client: Arc<dyn MediaServerClient>,
    store: Arc<RoomStateStore>,
}

impl Resynchronizer {
    pub fn new(client: Arc<dyn MediaServerClient>, store: Arc<RoomStateStore>) -> Self {
        Self { client, store }
    }

    /// Replace the store with the media server's current view.
    ///
    /// Returns the number of rooms loaded.
    ///
    /// # Errors
    ///
    /// - `ResyncError::Upstream` if any listing call fails
    /// - `ResyncError::MalformedMetadata` if any room's metadata is not valid
    ///   JSON
    #[instrument(skip_all, name = "rc.resync")]
    pub async fn resync(&self) -> Result<usize, ResyncError> {
        let start = Instant::now();
        let result = self.pull().await;

        match result {
            Ok(rooms) => {
                let count = rooms.len();
                let participants: usize = rooms.iter().map(|r| r.participants.len()).sum();
                self.store.replace_all(rooms).await;
                metrics::record_resync("success", start.elapsed());
                info!(
                    target: "rc.services.resync",
                    rooms = count,
                    participants = participants,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Room state resynchronized"
                );
                Ok(count)
            }
            Err(e) => {
                metrics::record_resync("error", start.elapsed());
                warn!(target: "rc.services.resync", error = %e, "Resync aborted, keeping previous state");
                Err(e)
            }
        }
    }

    async fn pull(&self) -> Result<Vec<Room>, ResyncError> {
        let remote_rooms = self.client.list_rooms().await?;
        let mut rooms = Vec::with_capacity(remote_rooms.len());

        for remote in remote_rooms {
            let metadata = RoomMetadata::parse(&remote.metadata).map_err(|source| {
                ResyncError::MalformedMetadata {
                    room: remote.name.clone(),
                    source,
                }
            })?;

            let participants = self
                .client
                .list_participants(&remote.name)
                .await?
                .into_iter()
                .map(|p| p.into_participant())
                .collect();

            rooms.push(Room {
                room_id: remote.name,
                metadata: remote.metadata,
                is_webinar: metadata.is_webinar,
                participants,
            });
        }

        Ok(rooms)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::Participant;
    use crate::services::livekit_client::mock::MockMediaServerClient;
    use crate::services::livekit_client::{ParticipantPermission, RemoteParticipant, RemoteRoom};
    use std::collections::BTreeMap;

    fn remote_room(name: &str, metadata: &str) -> RemoteRoom {
        RemoteRoom {
            name: name.to_string(),
            metadata: metadata.to_string(),
        }
    }

    fn remote_participant(identity: &str, can_publish: bool) -> RemoteParticipant {
        RemoteParticipant {
            identity: identity.to_string(),
            name: identity.split('_').next().unwrap().to_string(),
            joined_at: 1_700_000_000,
            attributes: BTreeMap::new(),
            permission: Some(ParticipantPermission::with_publish(can_publish)),
        }
    }

    #[tokio::test]
    async fn test_resync_then_snapshot_reproduces_listing() {
        let client = MockMediaServerClient::empty()
            .with_room(
                remote_room("r1", r#"{"status":"live","isWebinar":true}"#),
                vec![
                    remote_participant("alice_0a0b0c0d", true),
                    remote_participant("bob_01020304", false),
                ],
            )
            .with_room(remote_room("r2", ""), vec![]);
        let store = Arc::new(RoomStateStore::new());
        let resync = Resynchronizer::new(Arc::new(client), Arc::clone(&store));

        assert_eq!(resync.resync().await.unwrap(), 2);

        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.len(), 2);
        let r1 = &snapshot[0];
        assert_eq!(r1.room_id, "r1");
        assert!(r1.is_webinar);
        assert_eq!(r1.metadata, r#"{"status":"live","isWebinar":true}"#);
        let identities: Vec<_> = r1.participants.iter().map(|p| p.identity.as_str()).collect();
        assert_eq!(identities, vec!["alice_0a0b0c0d", "bob_01020304"]);
        assert!(!r1.participants[1].can_publish);
        assert_eq!(r1.participants[0].joined_at.timestamp(), 1_700_000_000);

        assert_eq!(snapshot[1].room_id, "r2");
        assert!(!snapshot[1].is_webinar);
        assert!(snapshot[1].participants.is_empty());
    }

    #[tokio::test]
    async fn test_resync_replaces_previous_state() {
        let store = Arc::new(RoomStateStore::new());
        store.upsert_room(Room::empty("stale", false)).await;

        let client = MockMediaServerClient::empty().with_room(remote_room("fresh", ""), vec![]);
        Resynchronizer::new(Arc::new(client), Arc::clone(&store))
            .resync()
            .await
            .unwrap();

        assert!(store.find_room("stale").await.is_none());
        assert!(store.find_room("fresh").await.is_some());
    }

    /// The webinar flag of a locally created room lives only in the store;
    /// an upstream listing without metadata is authoritative over it.
    #[tokio::test]
    async fn test_upstream_metadata_overrides_local_webinar_flag() {
        let store = Arc::new(RoomStateStore::new());
        store.upsert_room(Room::empty("r1", true)).await;

        let client = MockMediaServerClient::empty().with_room(remote_room("r1", ""), vec![]);
        Resynchronizer::new(Arc::new(client), Arc::clone(&store))
            .resync()
            .await
            .unwrap();

        assert!(!store.find_room("r1").await.unwrap().is_webinar);
    }

    #[tokio::test]
    async fn test_malformed_metadata_aborts_and_keeps_state() {
        let store = Arc::new(RoomStateStore::new());
        store.upsert_room(Room::empty("existing", true)).await;
        store
            .add_participant(
                "existing",
                Participant {
                    identity: "carol_1".to_string(),
                    name: "carol".to_string(),
                    joined_at: crate::models::joined_at_from_unix(0),
                    attributes: BTreeMap::new(),
                    can_publish: true,
                },
            )
            .await;
        let before = store.snapshot().await;

        let client = MockMediaServerClient::empty()
            .with_room(remote_room("good", ""), vec![])
            .with_room(remote_room("bad", "{not json"), vec![]);
        let result = Resynchronizer::new(Arc::new(client), Arc::clone(&store))
            .resync()
            .await;

        assert!(matches!(
            result,
            Err(ResyncError::MalformedMetadata { ref room, .. }) if room == "bad"
        ));
        assert_eq!(store.snapshot().await, before);
    }

    #[tokio::test]
    async fn test_upstream_failure_keeps_state() {
        let store = Arc::new(RoomStateStore::new());
        store.upsert_room(Room::empty("existing", false)).await;

        let result = Resynchronizer::new(
            Arc::new(MockMediaServerClient::failing()),
            Arc::clone(&store),
        )
        .resync()
        .await;

        assert!(matches!(result, Err(ResyncError::Upstream(_))));
        assert_eq!(store.room_count().await, 1);
    }

    #[tokio::test]
    async fn test_participant_listing_failure_aborts() {
        let store = Arc::new(RoomStateStore::new());
        let client = MockMediaServerClient::empty()
            .with_room(remote_room("r1", ""), vec![])
            .failing_participants();

        let result = Resynchronizer::new(Arc::new(client), Arc::clone(&store))
            .resync()
            .await;

        assert!(matches!(result, Err(ResyncError::Upstream(_))));
        assert_eq!(store.room_count().await, 0);
    }
}
