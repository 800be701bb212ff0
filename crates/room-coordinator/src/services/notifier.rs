//! Chat notifications.
//!
//! Room lifecycle announcements are posted to a chat channel. Rooms are
//! named after chat channel ids, so each announcement mentions the channel's
//! path, resolved through the chat API at send time.
//!
//! Delivery is best-effort. Producers hand a `Notification` to the
//! `NotificationDispatcher`, which never blocks and never fails the caller;
//! the notification worker task (`tasks::notification_worker`) drains the
//! queue into a `ChatNotifier`.

use crate::config::NotifierConfig;
use crate::errors::RcError;
use crate::observability::metrics;
use common::secret::{ExposeSecret, SecretString};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, instrument, warn};

/// Capacity of the notification queue.
pub const NOTIFICATION_QUEUE_CAPACITY: usize = 256;

/// A room lifecycle announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    ParticipantJoined { room: String, name: String },
    ParticipantLeft { room: String, name: String },
    RoomStarted { room: String },
    RoomFinished { room: String },
    ScreenShareStarted { room: String, name: String },
}

impl Notification {
    /// Room (chat channel id) the announcement is about.
    pub fn room(&self) -> &str {
        match self {
            Notification::ParticipantJoined { room, .. }
            | Notification::ParticipantLeft { room, .. }
            | Notification::RoomStarted { room }
            | Notification::RoomFinished { room }
            | Notification::ScreenShareStarted { room, .. } => room,
        }
    }

    /// Message text, given the room's channel path without its leading `/`.
    pub fn render(&self, channel_path: &str) -> String {
        match self {
            Notification::ParticipantJoined { name, .. } => {
                format!(":@{name}: {name} さんが #{channel_path} に参加しました")
            }
            Notification::ParticipantLeft { name, .. } => {
                format!(":@{name}: {name} さんが #{channel_path} から退出しました")
            }
            Notification::RoomStarted { .. } => {
                format!("#{channel_path} で Qall が開始されました")
            }
            Notification::RoomFinished { .. } => {
                format!("#{channel_path} で Qall が終了しました")
            }
            Notification::ScreenShareStarted { name, .. } => {
                format!(":@{name}: {name} さんが #{channel_path} で画面共有を開始しました")
            }
        }
    }
}

/// Non-blocking handle for queueing notifications.
#[derive(Clone)]
pub struct NotificationDispatcher {
    sender: mpsc::Sender<Notification>,
}

impl NotificationDispatcher {
    /// Create a dispatcher and the receiving end for the worker.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Notification>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }

    /// Queue a notification. A full or closed queue drops it with a log line.
    pub fn dispatch(&self, notification: Notification) {
        match self.sender.try_send(notification) {
            Ok(()) => {}
            Err(TrySendError::Full(dropped)) => {
                metrics::record_notification("dropped");
                warn!(
                    target: "rc.services.notifier",
                    room = %dropped.room(),
                    "Notification queue full, dropping notification"
                );
            }
            Err(TrySendError::Closed(dropped)) => {
                metrics::record_notification("dropped");
                debug!(
                    target: "rc.services.notifier",
                    room = %dropped.room(),
                    "Notification worker stopped, dropping notification"
                );
            }
        }
    }
}

/// Trait for chat delivery (enables mocking).
#[async_trait::async_trait]
pub trait ChatNotifier: Send + Sync {
    /// Deliver one notification.
    async fn notify(&self, notification: &Notification) -> Result<(), RcError>;
}

/// Notifier used when no chat bot is configured.
pub struct DisabledNotifier;

#[async_trait::async_trait]
impl ChatNotifier for DisabledNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), RcError> {
        debug!(
            target: "rc.services.notifier",
            notification = ?notification,
            "Chat notifications disabled, skipping"
        );
        Ok(())
    }
}

#[derive(Deserialize)]
struct ChannelPathResponse {
    #[serde(default)]
    path: String,
}

/// traQ bot client posting to the notification channel.
pub struct TraqNotifier {
    client: Client,
    api_url: String,
    access_token: SecretString,
    channel_id: String,
}

impl TraqNotifier {
    /// Create a new chat client.
    ///
    /// # Errors
    ///
    /// Returns `RcError::Internal` if the HTTP client cannot be built.
    pub fn new(config: &NotifierConfig, timeout: Duration) -> Result<Self, RcError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| {
                error!(target: "rc.services.notifier", error = %e, "Failed to build HTTP client");
                RcError::Internal
            })?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
            channel_id: config.channel_id.clone(),
        })
    }

    /// Channel path of a room, without the leading `/`.
    ///
    /// A failed lookup yields an empty path; the announcement is still sent.
    async fn channel_path(&self, channel_id: &str) -> String {
        let url = format!("{}/channels/{}/path", self.api_url, channel_id);
        let result = self
            .client
            .get(&url)
            .bearer_auth(self.access_token.expose_secret())
            .send()
            .await
            .and_then(reqwest::Response::error_for_status);

        let path = match result {
            Ok(response) => match response.json::<ChannelPathResponse>().await {
                Ok(body) => body.path,
                Err(e) => {
                    warn!(target: "rc.services.notifier", error = %e, channel_id = %channel_id, "Malformed channel path response");
                    String::new()
                }
            },
            Err(e) => {
                warn!(target: "rc.services.notifier", error = %e, channel_id = %channel_id, "Channel path lookup failed");
                String::new()
            }
        };

        match path.strip_prefix('/') {
            Some(stripped) if !stripped.is_empty() => stripped.to_string(),
            _ => path,
        }
    }
}

#[async_trait::async_trait]
impl ChatNotifier for TraqNotifier {
    #[instrument(skip_all, name = "rc.notifier.notify", fields(room = %notification.room()))]
    async fn notify(&self, notification: &Notification) -> Result<(), RcError> {
        let path = self.channel_path(notification.room()).await;
        let content = notification.render(&path);

        let url = format!("{}/channels/{}/messages", self.api_url, self.channel_id);
        let response = self
            .client
            .post(&url)
            .bearer_auth(self.access_token.expose_secret())
            .json(&serde_json::json!({ "content": content, "embed": true }))
            .send()
            .await
            .map_err(|e| RcError::Upstream(format!("chat service unreachable: {e}")))?;

        let status = response.status();
        if status.is_success() {
            debug!(target: "rc.services.notifier", "Notification posted");
            Ok(())
        } else {
            Err(RcError::Upstream(format!(
                "chat service answered {}",
                status.as_u16()
            )))
        }
    }
}

/// Mock chat notifier module for testing.
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    /// Records every notification it is asked to deliver.
    #[derive(Default)]
    pub struct RecordingNotifier {
        delivered: Mutex<Vec<Notification>>,
        fail: bool,
    }

    impl RecordingNotifier {
        pub fn new() -> Self {
            Self::default()
        }

        /// Every delivery fails (after being recorded).
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn delivered(&self) -> Vec<Notification> {
            self.delivered
                .lock()
                .map(|d| d.clone())
                .unwrap_or_default()
        }
    }

    #[async_trait::async_trait]
    impl ChatNotifier for RecordingNotifier {
        async fn notify(&self, notification: &Notification) -> Result<(), RcError> {
            if let Ok(mut delivered) = self.delivered.lock() {
                delivered.push(notification.clone());
            }
            if self.fail {
                return Err(RcError::Upstream("Mock chat error".to_string()));
            }
            Ok(())
        }
    }
}
