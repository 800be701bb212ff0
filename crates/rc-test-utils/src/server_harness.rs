//! Test server harness for E2E testing
//!
//! Provides `TestRcServer` for spawning real Room Coordinator instances in
//! tests, backed by a caller-supplied media server client.

use crate::crypto_fixtures::TestBearerKey;
use crate::webhook_signer::sign_webhook;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use room_coordinator::config::Config;
use room_coordinator::routes::{self, AppState};
use room_coordinator::services::{MediaServerClient, Notification, NotificationDispatcher};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

/// API key configured on every test server.
pub const TEST_API_KEY: &str = "APItestkey";

/// API secret configured on every test server.
pub const TEST_API_SECRET: &str = "test-api-secret-for-webhooks";

static TEST_METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Recorder handle that is never installed globally, so any number of test
/// servers can share it.
fn test_metrics_handle() -> PrometheusHandle {
    TEST_METRICS_HANDLE
        .get_or_init(|| PrometheusBuilder::new().build_recorder().handle())
        .clone()
}

/// Test harness for spawning the Room Coordinator in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_rooms_e2e() -> Result<(), anyhow::Error> {
///     let server = TestRcServer::spawn(Arc::new(MockMediaServerClient::empty())).await?;
///     let response = reqwest::get(format!("{}/api/rooms", server.url())).await?;
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestRcServer {
    addr: SocketAddr,
    state: Arc<AppState>,
    bearer_key: TestBearerKey,
    notifications: Mutex<mpsc::Receiver<Notification>>,
    _handle: JoinHandle<()>,
}

impl TestRcServer {
    /// Spawn a server with default test configuration.
    pub async fn spawn(media_client: Arc<dyn MediaServerClient>) -> Result<Self, anyhow::Error> {
        Self::spawn_with_vars(media_client, HashMap::new()).await
    }

    /// Spawn a server, overriding configuration variables.
    ///
    /// The server will:
    /// - Trust a freshly generated bearer key
    /// - Use `TEST_API_KEY`/`TEST_API_SECRET` unless overridden
    /// - Bind to a random available port (127.0.0.1:0)
    ///
    /// Startup resync is not run; tests seed state through the media
    /// server client or `state()`.
    pub async fn spawn_with_vars(
        media_client: Arc<dyn MediaServerClient>,
        overrides: HashMap<String, String>,
    ) -> Result<Self, anyhow::Error> {
        let bearer_key = TestBearerKey::generate()?;

        let mut vars = HashMap::from([
            (
                "LIVEKIT_HOST".to_string(),
                "http://127.0.0.1:7880".to_string(),
            ),
            ("LIVEKIT_API_KEY".to_string(), TEST_API_KEY.to_string()),
            ("LIVEKIT_API_SECRET".to_string(), TEST_API_SECRET.to_string()),
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            (
                "AUTH_PUBLIC_KEYS_PEM".to_string(),
                bearer_key.public_key_pem().to_string(),
            ),
        ]);
        for (key, value) in overrides {
            if value.is_empty() {
                vars.remove(&key);
            } else {
                vars.insert(key, value);
            }
        }

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let (dispatcher, notifications) = NotificationDispatcher::channel(64);
        let state = Arc::new(
            AppState::new(config, media_client, dispatcher)
                .map_err(|e| anyhow::anyhow!("Failed to create state: {}", e))?,
        );

        let app = routes::build_routes(Arc::clone(&state), test_metrics_handle());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            state,
            bearer_key,
            notifications: Mutex::new(notifications),
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the observer websocket URL.
    pub fn ws_url(&self) -> String {
        format!("ws://{}/api/ws", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Shared application state (store, broadcaster, ...).
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Key trusted for bearer credentials.
    pub fn bearer_key(&self) -> &TestBearerKey {
        &self.bearer_key
    }

    /// Notifications queued so far, in order.
    pub async fn drain_notifications(&self) -> Vec<Notification> {
        let mut receiver = self.notifications.lock().await;
        let mut drained = Vec::new();
        while let Ok(notification) = receiver.try_recv() {
            drained.push(notification);
        }
        drained
    }

    /// POST a signed webhook body.
    pub async fn post_webhook(
        &self,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, anyhow::Error> {
        let body = serde_json::to_vec(body)?;
        let signature = sign_webhook(TEST_API_KEY, TEST_API_SECRET, &body);
        Ok(reqwest::Client::new()
            .post(format!("{}/api/webhook", self.url()))
            .header("content-type", "application/webhook+json")
            .header("authorization", signature)
            .body(body)
            .send()
            .await?)
    }
}

impl Drop for TestRcServer {
    fn drop(&mut self) {
        // Abort the HTTP server task so the port is released when the test
        // completes.
        self._handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use room_coordinator::services::livekit_client::mock::MockMediaServerClient;

    #[tokio::test]
    async fn test_server_spawns_successfully() -> Result<(), anyhow::Error> {
        let server = TestRcServer::spawn(Arc::new(MockMediaServerClient::empty())).await?;

        assert!(server.url().starts_with("http://127.0.0.1:"));

        let response = reqwest::get(format!("{}/api/health", server.url())).await?;
        assert_eq!(response.status(), 200);

        let body: serde_json::Value = response.json().await?;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["rooms"], 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_multiple_servers_different_ports() -> Result<(), anyhow::Error> {
        let server1 = TestRcServer::spawn(Arc::new(MockMediaServerClient::empty())).await?;
        let server2 = TestRcServer::spawn(Arc::new(MockMediaServerClient::empty())).await?;

        assert_ne!(server1.addr(), server2.addr());
        assert_ne!(
            server1.bearer_key().public_key_pem(),
            server2.bearer_key().public_key_pem()
        );

        Ok(())
    }
}
