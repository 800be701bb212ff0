//! Media server webhook integration tests.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use rc_test_utils::{sign_webhook, TestRcServer, TEST_API_KEY};
use room_coordinator::services::livekit_client::mock::MockMediaServerClient;
use room_coordinator::services::Notification;
use serde_json::json;
use std::sync::Arc;

async fn spawn() -> Result<TestRcServer, anyhow::Error> {
    TestRcServer::spawn(Arc::new(MockMediaServerClient::empty())).await
}

fn joined(room: &str, identity: &str, name: &str) -> serde_json::Value {
    json!({
        "event": "participant_joined",
        "room": {"name": room, "metadata": ""},
        "participant": {"identity": identity, "name": name, "joinedAt": "1700000000"}
    })
}

fn left(room: &str, identity: &str, name: &str) -> serde_json::Value {
    json!({
        "event": "participant_left",
        "room": {"name": room},
        "participant": {"identity": identity, "name": name}
    })
}

/// Join, leave, then a duplicate leave: the room survives empty and the
/// second leave is a no-op.
#[tokio::test]
async fn test_join_leave_sequence() -> Result<(), anyhow::Error> {
    let server = spawn().await?;

    let response = server.post_webhook(&joined("r1", "alice_01", "alice")).await?;
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["status"], "ok");

    let r1 = server.state().store.find_room("r1").await.unwrap();
    assert_eq!(r1.participants.len(), 1);
    assert_eq!(r1.participants[0].identity, "alice_01");
    assert!(r1.participants[0].can_publish);

    for _ in 0..2 {
        let response = server.post_webhook(&left("r1", "alice_01", "alice")).await?;
        assert_eq!(response.status(), 200);
    }

    let r1 = server.state().store.find_room("r1").await.unwrap();
    assert!(r1.participants.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_events_queue_notifications() -> Result<(), anyhow::Error> {
    let server = spawn().await?;

    server
        .post_webhook(&json!({"event": "room_started", "room": {"name": "r1"}}))
        .await?;
    server.post_webhook(&joined("r1", "alice_01", "alice")).await?;
    server
        .post_webhook(&json!({"event": "room_finished", "room": {"name": "r1"}}))
        .await?;

    assert_eq!(
        server.drain_notifications().await,
        vec![
            Notification::RoomStarted {
                room: "r1".to_string()
            },
            Notification::ParticipantJoined {
                room: "r1".to_string(),
                name: "alice".to_string()
            },
            Notification::RoomFinished {
                room: "r1".to_string()
            },
        ]
    );
    assert!(server.state().store.find_room("r1").await.is_none());
    Ok(())
}

#[tokio::test]
async fn test_room_started_reads_webinar_metadata() -> Result<(), anyhow::Error> {
    let server = spawn().await?;

    server
        .post_webhook(&json!({
            "event": "room_started",
            "room": {"name": "seminar", "metadata": "{\"isWebinar\":true}"}
        }))
        .await?;

    let room = server.state().store.find_room("seminar").await.unwrap();
    assert!(room.is_webinar);
    Ok(())
}

#[tokio::test]
async fn test_unknown_event_is_acknowledged() -> Result<(), anyhow::Error> {
    let server = spawn().await?;

    let response = server
        .post_webhook(&json!({"event": "egress_started", "egressInfo": {}}))
        .await?;

    assert_eq!(response.status(), 200);
    assert_eq!(server.state().store.room_count().await, 0);
    assert!(server.drain_notifications().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_wrong_content_type_is_rejected() -> Result<(), anyhow::Error> {
    let server = spawn().await?;
    let body = serde_json::to_vec(&joined("r1", "alice_01", "alice"))?;

    let response = reqwest::Client::new()
        .post(format!("{}/api/webhook", server.url()))
        .header("content-type", "text/plain")
        .header(
            "authorization",
            sign_webhook(TEST_API_KEY, rc_test_utils::TEST_API_SECRET, &body),
        )
        .body(body)
        .send()
        .await?;

    assert_eq!(response.status(), 415);
    assert!(server.state().store.find_room("r1").await.is_none());
    Ok(())
}

#[tokio::test]
async fn test_bad_signature_is_rejected() -> Result<(), anyhow::Error> {
    let server = spawn().await?;
    let body = serde_json::to_vec(&joined("r1", "alice_01", "alice"))?;

    let response = reqwest::Client::new()
        .post(format!("{}/api/webhook", server.url()))
        .header("content-type", "application/webhook+json")
        .header("authorization", sign_webhook(TEST_API_KEY, "wrong-secret", &body))
        .body(body)
        .send()
        .await?;

    assert_eq!(response.status(), 401);
    assert!(server.state().store.find_room("r1").await.is_none());
    Ok(())
}

#[tokio::test]
async fn test_tampered_body_is_rejected() -> Result<(), anyhow::Error> {
    let server = spawn().await?;
    let signed = serde_json::to_vec(&joined("r1", "alice_01", "alice"))?;
    let delivered = serde_json::to_vec(&joined("r1", "mallory_01", "mallory"))?;

    let response = reqwest::Client::new()
        .post(format!("{}/api/webhook", server.url()))
        .header("content-type", "application/webhook+json")
        .header(
            "authorization",
            sign_webhook(TEST_API_KEY, rc_test_utils::TEST_API_SECRET, &signed),
        )
        .body(delivered)
        .send()
        .await?;

    assert_eq!(response.status(), 401);
    assert_eq!(server.state().store.room_count().await, 0);
    Ok(())
}

#[tokio::test]
async fn test_malformed_payload_is_bad_request() -> Result<(), anyhow::Error> {
    let server = spawn().await?;
    let body = b"{not json".to_vec();

    let response = reqwest::Client::new()
        .post(format!("{}/api/webhook", server.url()))
        .header("content-type", "application/webhook+json")
        .header(
            "authorization",
            sign_webhook(TEST_API_KEY, rc_test_utils::TEST_API_SECRET, &body),
        )
        .body(body)
        .send()
        .await?;

    assert_eq!(response.status(), 400);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"], "Invalid Webhook payload");
    Ok(())
}
