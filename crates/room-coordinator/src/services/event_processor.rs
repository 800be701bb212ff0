//! Event Processor.
//!
//! Applies media server lifecycle notifications to the room state store:
//!
//! | Event | Store | Broadcast | Announcement |
//! |---|---|---|---|
//! | `participant_joined` | create room if unknown, add participant | yes | joined |
//! | `participant_left` | remove participant (no-op if absent) | if changed | left |
//! | `room_started` | create room if unknown | if changed | started |
//! | `room_finished` | remove room | if changed | finished |
//! | `track_published` | none | no | screen share, if the participant has attributes |
//! | anything else | none | no | none |
//!
//! Broadcast and notification are side effects. Neither can fail the
//! webhook request.

use crate::models::{Room, RoomMetadata};
use crate::observability::metrics;
use crate::services::notifier::{Notification, NotificationDispatcher};
use crate::services::webhook::WebhookEvent;
use crate::state::{Broadcaster, RoomStateStore};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// What processing an event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventOutcome {
    /// Whether the room state changed (and was broadcast).
    pub state_changed: bool,
}

/// Applies webhook events to shared room state.
pub struct EventProcessor {
    store: Arc<RoomStateStore>,
    broadcaster: Arc<Broadcaster>,
    notifications: NotificationDispatcher,
}

impl EventProcessor {
    pub fn new(
        store: Arc<RoomStateStore>,
        broadcaster: Arc<Broadcaster>,
        notifications: NotificationDispatcher,
    ) -> Self {
        Self {
            store,
            broadcaster,
            notifications,
        }
    }

    /// Apply one event. Never fails: unknown events are logged and accepted.
    #[instrument(skip_all, name = "rc.events.process", fields(event = %event.kind()))]
    pub async fn process(&self, event: WebhookEvent) -> EventOutcome {
        let kind = event.kind();
        metrics::record_webhook_event(kind);

        let state_changed = match event {
            WebhookEvent::ParticipantJoined { room, participant } => {
                let metadata = RoomMetadata::parse_lenient(&room.metadata);
                let existed = self
                    .store
                    .get_or_create_room(Room {
                        room_id: room.name.clone(),
                        metadata: room.metadata,
                        is_webinar: metadata.is_webinar,
                        participants: Vec::new(),
                    })
                    .await;
                if !existed {
                    info!(target: "rc.services.events", room = %room.name, "Room surfaced through join");
                }

                let participant = participant.into_participant();
                let name = participant.name.clone();
                info!(
                    target: "rc.services.events",
                    room = %room.name,
                    identity = %participant.identity,
                    "Participant joined"
                );
                self.store.add_participant(&room.name, participant).await;
                self.notifications.dispatch(Notification::ParticipantJoined {
                    room: room.name,
                    name,
                });
                true
            }
            WebhookEvent::ParticipantLeft {
                room,
                identity,
                name,
            } => {
                let removed = self.store.remove_participant(&room, &identity).await;
                if removed {
                    info!(target: "rc.services.events", room = %room, identity = %identity, "Participant left");
                } else {
                    debug!(target: "rc.services.events", room = %room, identity = %identity, "Participant already absent");
                }
                self.notifications
                    .dispatch(Notification::ParticipantLeft { room, name });
                removed
            }
            WebhookEvent::RoomStarted { room } => {
                let metadata = RoomMetadata::parse_lenient(&room.metadata);
                let existed = self
                    .store
                    .get_or_create_room(Room {
                        room_id: room.name.clone(),
                        metadata: room.metadata,
                        is_webinar: metadata.is_webinar,
                        participants: Vec::new(),
                    })
                    .await;
                info!(target: "rc.services.events", room = %room.name, already_known = existed, "Room started");
                self.notifications
                    .dispatch(Notification::RoomStarted { room: room.name });
                !existed
            }
            WebhookEvent::RoomFinished { room } => {
                let removed = self.store.remove_room(&room).await;
                info!(target: "rc.services.events", room = %room, removed = removed, "Room finished");
                self.notifications
                    .dispatch(Notification::RoomFinished { room });
                removed
            }
            WebhookEvent::TrackPublished { room, participant } => {
                if participant.attributes.is_empty() {
                    debug!(target: "rc.services.events", room = %room, identity = %participant.identity, "Track published without attributes");
                } else {
                    info!(target: "rc.services.events", room = %room, identity = %participant.identity, "Screen share started");
                    self.notifications.dispatch(Notification::ScreenShareStarted {
                        room,
                        name: participant.name,
                    });
                }
                false
            }
            WebhookEvent::Unknown { event } => {
                debug!(target: "rc.services.events", event = %event, "Ignoring unhandled webhook event");
                false
            }
        };

        if state_changed {
            self.broadcaster.broadcast_current_state().await;
        }

        EventOutcome { state_changed }
    }
}
