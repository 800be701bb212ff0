//! Notification worker background task.
//!
//! Drains the notification queue into the chat notifier. Delivery failures
//! are logged and counted; they never reach the request that caused the
//! announcement.

use crate::observability::metrics;
use crate::services::{ChatNotifier, Notification};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Start the notification worker.
///
/// Returns when the token is cancelled or every dispatcher is dropped.
/// Queued notifications are abandoned on cancellation.
#[instrument(skip_all, name = "rc.task.notification_worker")]
pub async fn start_notification_worker(
    notifier: Arc<dyn ChatNotifier>,
    mut receiver: mpsc::Receiver<Notification>,
    cancel_token: CancellationToken,
) {
    info!(target: "rc.task.notification_worker", "Starting notification worker");

    loop {
        tokio::select! {
            next = receiver.recv() => {
                let Some(notification) = next else {
                    break;
                };
                match notifier.notify(&notification).await {
                    Ok(()) => metrics::record_notification("sent"),
                    Err(e) => {
                        metrics::record_notification("failed");
                        warn!(
                            target: "rc.task.notification_worker",
                            room = %notification.room(),
                            error = %e,
                            "Failed to deliver notification"
                        );
                    }
                }
            }
            _ = cancel_token.cancelled() => {
                info!(
                    target: "rc.task.notification_worker",
                    "Notification worker received shutdown signal, exiting"
                );
                break;
            }
        }
    }

    info!(target: "rc.task.notification_worker", "Notification worker stopped");
}
