//! Periodic resync background task.
//!
//! Re-runs the Resynchronizer on a fixed interval as a recovery path for
//! missed or malformed webhook events. A failed pass leaves the store at its
//! last known-good state; the next tick tries again.
//!
//! A pass replaces local state wholesale. The webinar flag of a room created
//! by an access grant is only known locally, so a pass resets it to what the
//! room's upstream metadata says (not a webinar, when it has none).
//!
//! # Graceful Shutdown
//!
//! The task exits when the cancellation token is triggered. An in-flight
//! resync finishes first.

use crate::services::Resynchronizer;
use crate::state::Broadcaster;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

/// Start the periodic resync task.
///
/// The first pass runs one `period` after start; the startup resync has
/// already run by then. Each successful pass is broadcast to observers.
#[instrument(skip_all, name = "rc.task.resync")]
pub async fn start_resync_task(
    resynchronizer: Arc<Resynchronizer>,
    broadcaster: Arc<Broadcaster>,
    period: Duration,
    cancel_token: CancellationToken,
) {
    info!(
        target: "rc.task.resync",
        interval_seconds = period.as_secs(),
        "Starting resync task"
    );

    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match resynchronizer.resync().await {
                    Ok(_) => {
                        broadcaster.broadcast_current_state().await;
                    }
                    Err(e) => {
                        error!(
                            target: "rc.task.resync",
                            error = %e,
                            "Periodic resync failed"
                        );
                    }
                }
            }
            _ = cancel_token.cancelled() => {
                info!(
                    target: "rc.task.resync",
                    "Resync task received shutdown signal, exiting"
                );
                break;
            }
        }
    }

    info!(target: "rc.task.resync", "Resync task stopped");
}
