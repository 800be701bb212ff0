//! Participant permission updates.
//!
//! Pushes publish permission changes to the media server first and mirrors
//! each accepted change into the store. The store is only touched after the
//! media server accepted the change, so a failed call leaves local state at
//! its last known-good value.

use crate::errors::RcError;
use crate::models::ParticipantPermissionUpdate;
use crate::services::livekit_client::{MediaServerClient, ParticipantPermission};
use crate::state::{Broadcaster, RoomStateStore};
use tracing::{info, instrument, warn};

/// Apply `updates` to the participants of `room_id`.
///
/// Updates are applied in order and stop at the first media server failure;
/// entries before it stay applied. One broadcast follows if anything changed.
///
/// # Errors
///
/// - `RcError::NotFound` if the room is unknown
/// - `RcError::Upstream` if the media server rejects an update
#[instrument(skip_all, name = "rc.permissions.update", fields(room = %room_id, count = updates.len()))]
pub async fn update_participant_permissions(
    client: &dyn MediaServerClient,
    store: &RoomStateStore,
    broadcaster: &Broadcaster,
    room_id: &str,
    updates: &[ParticipantPermissionUpdate],
) -> Result<usize, RcError> {
    if store.find_room(room_id).await.is_none() {
        return Err(RcError::NotFound(format!("Room {room_id} not found")));
    }

    let mut changed = 0;
    let mut failure = None;
    for update in updates {
        let permission = ParticipantPermission::with_publish(update.can_publish);
        if let Err(e) = client
            .update_participant_permission(room_id, &update.identity, &permission)
            .await
        {
            warn!(
                target: "rc.services.permissions",
                identity = %update.identity,
                error = %e,
                "Media server rejected permission update"
            );
            failure = Some(e);
            break;
        }

        if store
            .update_participant_capability(room_id, &update.identity, update.can_publish)
            .await
        {
            changed += 1;
        }
        info!(
            target: "rc.services.permissions",
            identity = %update.identity,
            can_publish = update.can_publish,
            "Participant permission updated"
        );
    }

    if changed > 0 {
        broadcaster.broadcast_current_state().await;
    }

    match failure {
        Some(e) => Err(e),
        None => Ok(changed),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::{joined_at_from_unix, Participant, Room};
    use crate::services::livekit_client::mock::MockMediaServerClient;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    async fn store_with_bob() -> Arc<RoomStateStore> {
        let store = Arc::new(RoomStateStore::new());
        store.upsert_room(Room::empty("r1", true)).await;
        store
            .add_participant(
                "r1",
                Participant {
                    identity: "bob_1".to_string(),
                    name: "bob".to_string(),
                    joined_at: joined_at_from_unix(0),
                    attributes: BTreeMap::new(),
                    can_publish: false,
                },
            )
            .await;
        store
    }

    fn grant(identity: &str, can_publish: bool) -> ParticipantPermissionUpdate {
        ParticipantPermissionUpdate {
            identity: identity.to_string(),
            can_publish,
        }
    }

    #[tokio::test]
    async fn test_update_applies_to_media_server_then_store() {
        let store = store_with_bob().await;
        let broadcaster = Broadcaster::new(Arc::clone(&store));
        let client = MockMediaServerClient::empty();

        let changed = update_participant_permissions(
            &client,
            &store,
            &broadcaster,
            "r1",
            &[grant("bob_1", true)],
        )
        .await
        .unwrap();

        assert_eq!(changed, 1);
        assert_eq!(client.updates().len(), 1);
        assert!(store.find_room("r1").await.unwrap().participants[0].can_publish);
    }

    #[tokio::test]
    async fn test_unknown_room_is_not_found() {
        let store = Arc::new(RoomStateStore::new());
        let broadcaster = Broadcaster::new(Arc::clone(&store));
        let client = MockMediaServerClient::empty();

        let result =
            update_participant_permissions(&client, &store, &broadcaster, "nope", &[]).await;
        assert!(matches!(result, Err(RcError::NotFound(_))));
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_upstream_failure_leaves_state() {
        let store = store_with_bob().await;
        let broadcaster = Broadcaster::new(Arc::clone(&store));
        let client = MockMediaServerClient::empty().failing_updates();

        let result = update_participant_permissions(
            &client,
            &store,
            &broadcaster,
            "r1",
            &[grant("bob_1", true)],
        )
        .await;

        assert!(matches!(result, Err(RcError::Upstream(_))));
        assert!(!store.find_room("r1").await.unwrap().participants[0].can_publish);
    }
}
