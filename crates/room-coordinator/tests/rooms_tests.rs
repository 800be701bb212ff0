//! Room state and participant permission integration tests.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use common::secret::SecretString;
use rc_test_utils::{TestRcServer, TEST_API_KEY, TEST_API_SECRET};
use room_coordinator::auth::SigningCredentials;
use room_coordinator::models::{Participant, Room};
use room_coordinator::services::livekit_client::mock::MockMediaServerClient;
use room_coordinator::services::livekit_client::ParticipantPermission;
use room_coordinator::services::{LiveKitClient, MediaServerClient, Resynchronizer};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn participant(identity: &str, can_publish: bool) -> Participant {
    Participant {
        identity: identity.to_string(),
        name: identity.to_string(),
        joined_at: room_coordinator::models::joined_at_from_unix(1_700_000_000),
        attributes: BTreeMap::new(),
        can_publish,
    }
}

async fn seed(server: &TestRcServer) {
    let store = &server.state().store;
    store.upsert_room(Room::empty("r1", true)).await;
    store.add_participant("r1", participant("alice_01", true)).await;
    store.add_participant("r1", participant("bob_02", false)).await;
}

#[tokio::test]
async fn test_list_rooms_returns_snapshot() -> Result<(), anyhow::Error> {
    let server = TestRcServer::spawn(Arc::new(MockMediaServerClient::empty())).await?;
    seed(&server).await;

    let rooms: serde_json::Value = reqwest::get(format!("{}/api/rooms", server.url()))
        .await?
        .json()
        .await?;

    assert_eq!(rooms.as_array().map(Vec::len), Some(1));
    assert_eq!(rooms[0]["roomId"], "r1");
    assert_eq!(rooms[0]["participants"][0]["identity"], "alice_01");
    assert_eq!(rooms[0]["participants"][1]["identity"], "bob_02");
    assert_eq!(
        rooms[0]["participants"][0]["joinedAt"],
        "2023-11-15T07:13:20+09:00"
    );
    Ok(())
}

#[tokio::test]
async fn test_get_unknown_room_is_not_found() -> Result<(), anyhow::Error> {
    let server = TestRcServer::spawn(Arc::new(MockMediaServerClient::empty())).await?;

    let response = reqwest::get(format!("{}/api/rooms/missing", server.url())).await?;

    assert_eq!(response.status(), 404);
    Ok(())
}

#[tokio::test]
async fn test_update_participants_pushes_to_media_server() -> Result<(), anyhow::Error> {
    let client = Arc::new(MockMediaServerClient::empty());
    let server = TestRcServer::spawn(Arc::clone(&client) as Arc<dyn MediaServerClient>).await?;
    seed(&server).await;

    let response = reqwest::Client::new()
        .patch(format!("{}/api/rooms/r1/participants", server.url()))
        .bearer_auth(server.bearer_key().sign_user("alice")?)
        .json(&json!({"users": [{"identity": "bob_02", "canPublish": true}]}))
        .send()
        .await?;

    assert_eq!(response.status(), 200);
    assert_eq!(
        client.updates(),
        vec![(
            "r1".to_string(),
            "bob_02".to_string(),
            ParticipantPermission::with_publish(true)
        )]
    );
    let r1 = server.state().store.find_room("r1").await.unwrap();
    assert!(r1.participants[1].can_publish);
    Ok(())
}

#[tokio::test]
async fn test_update_participants_requires_auth() -> Result<(), anyhow::Error> {
    let server = TestRcServer::spawn(Arc::new(MockMediaServerClient::empty())).await?;
    seed(&server).await;

    let response = reqwest::Client::new()
        .patch(format!("{}/api/rooms/r1/participants", server.url()))
        .json(&json!({"users": [{"identity": "bob_02", "canPublish": true}]}))
        .send()
        .await?;

    assert_eq!(response.status(), 401);
    Ok(())
}

#[tokio::test]
async fn test_update_participants_upstream_failure_keeps_state() -> Result<(), anyhow::Error> {
    let client = Arc::new(MockMediaServerClient::empty().failing_updates());
    let server = TestRcServer::spawn(client).await?;
    seed(&server).await;

    let response = reqwest::Client::new()
        .patch(format!("{}/api/rooms/r1/participants", server.url()))
        .bearer_auth(server.bearer_key().sign_user("alice")?)
        .json(&json!({"users": [{"identity": "bob_02", "canPublish": true}]}))
        .send()
        .await?;

    assert_eq!(response.status(), 503);
    let r1 = server.state().store.find_room("r1").await.unwrap();
    assert!(!r1.participants[1].can_publish);
    Ok(())
}

/// Resync through the real HTTP client against a stub media server, then
/// read the result back over the API.
#[tokio::test]
async fn test_resync_from_media_server() -> Result<(), anyhow::Error> {
    let media = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/twirp/livekit.RoomService/ListRooms"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "rooms": [{"name": "r1", "metadata": "{\"status\":\"live\",\"isWebinar\":true}"}]
        })))
        .mount(&media)
        .await;
    Mock::given(method("POST"))
        .and(path("/twirp/livekit.RoomService/ListParticipants"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "participants": [
                {"identity": "alice_01", "name": "alice", "joinedAt": "1700000000"},
                {
                    "identity": "bob_02",
                    "name": "bob",
                    "joinedAt": "1700000100",
                    "permission": {"canPublish": false, "canSubscribe": true}
                }
            ]
        })))
        .mount(&media)
        .await;

    let client: Arc<dyn MediaServerClient> = Arc::new(LiveKitClient::new(
        media.uri(),
        SigningCredentials::from_parts(
            Some(TEST_API_KEY.to_string()),
            Some(SecretString::from(TEST_API_SECRET)),
        ),
        Duration::from_secs(5),
    )?);
    let server = TestRcServer::spawn(Arc::clone(&client)).await?;

    let resynchronizer = Resynchronizer::new(client, Arc::clone(&server.state().store));
    assert_eq!(resynchronizer.resync().await?, 1);

    let room: serde_json::Value = reqwest::get(format!("{}/api/rooms/r1", server.url()))
        .await?
        .json()
        .await?;
    assert_eq!(room["isWebinar"], true);
    assert_eq!(room["participants"][0]["canPublish"], true);
    assert_eq!(room["participants"][1]["canPublish"], false);
    Ok(())
}
