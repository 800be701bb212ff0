//! Room State Store.
//!
//! The single authoritative in-memory table of rooms and their participants.
//! All access goes through atomic operations guarded by one lock; the raw
//! table is never handed out. Reads return deep copies.
//!
//! Every mutation is a no-op (not an error) when its target room or
//! participant does not exist, so at-least-once event delivery is safe.
//! Mutations return `true` when the table actually changed; callers use that
//! to decide whether a broadcast is needed.

use crate::models::{Participant, Room};
use tokio::sync::RwLock;
use tracing::debug;

/// In-memory room/participant table.
#[derive(Debug, Default)]
pub struct RoomStateStore {
    rooms: RwLock<Vec<Room>>,
}

impl RoomStateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entire contents with an authoritative listing.
    pub async fn replace_all(&self, rooms: Vec<Room>) {
        let mut table = self.rooms.write().await;
        debug!(
            target: "rc.state.store",
            previous = table.len(),
            current = rooms.len(),
            "Replacing room state"
        );
        *table = rooms;
    }

    /// Insert a room, or overwrite an existing room with the same id while
    /// keeping its position.
    ///
    /// Returns `true` if the table changed.
    pub async fn upsert_room(&self, room: Room) -> bool {
        let mut table = self.rooms.write().await;
        match table.iter_mut().find(|r| r.room_id == room.room_id) {
            Some(existing) if *existing == room => false,
            Some(existing) => {
                *existing = room;
                true
            }
            None => {
                debug!(target: "rc.state.store", room_id = %room.room_id, "Room added");
                table.push(room);
                true
            }
        }
    }

    /// Register `room` unless a room with the same id already exists.
    ///
    /// Returns `true` if the room already existed (nothing was changed).
    /// Check and insert happen under one write lock.
    pub async fn get_or_create_room(&self, room: Room) -> bool {
        let mut table = self.rooms.write().await;
        if table.iter().any(|r| r.room_id == room.room_id) {
            return true;
        }
        debug!(
            target: "rc.state.store",
            room_id = %room.room_id,
            is_webinar = room.is_webinar,
            "Room created"
        );
        table.push(room);
        false
    }

    /// Remove a room and all of its participants.
    pub async fn remove_room(&self, room_id: &str) -> bool {
        let mut table = self.rooms.write().await;
        let before = table.len();
        table.retain(|r| r.room_id != room_id);
        let removed = table.len() != before;
        if removed {
            debug!(target: "rc.state.store", room_id = %room_id, "Room removed");
        }
        removed
    }

    /// Add a participant to an existing room.
    ///
    /// An entry with the same identity is replaced in place, so a duplicate
    /// join leaves exactly one entry. No-op if the room is unknown.
    pub async fn add_participant(&self, room_id: &str, participant: Participant) -> bool {
        let mut table = self.rooms.write().await;
        let Some(room) = table.iter_mut().find(|r| r.room_id == room_id) else {
            debug!(
                target: "rc.state.store",
                room_id = %room_id,
                identity = %participant.identity,
                "Join for unknown room ignored"
            );
            return false;
        };

        match room
            .participants
            .iter_mut()
            .find(|p| p.identity == participant.identity)
        {
            Some(existing) if *existing == participant => false,
            Some(existing) => {
                debug!(
                    target: "rc.state.store",
                    room_id = %room_id,
                    identity = %participant.identity,
                    "Duplicate join replaced existing entry"
                );
                *existing = participant;
                true
            }
            None => {
                room.participants.push(participant);
                true
            }
        }
    }

    /// Remove a participant from a room. Absent room or identity is a no-op.
    pub async fn remove_participant(&self, room_id: &str, identity: &str) -> bool {
        let mut table = self.rooms.write().await;
        let Some(room) = table.iter_mut().find(|r| r.room_id == room_id) else {
            return false;
        };
        let before = room.participants.len();
        room.participants.retain(|p| p.identity != identity);
        room.participants.len() != before
    }

    /// Set the publish capability of one participant.
    pub async fn update_participant_capability(
        &self,
        room_id: &str,
        identity: &str,
        can_publish: bool,
    ) -> bool {
        let mut table = self.rooms.write().await;
        let participant = table
            .iter_mut()
            .find(|r| r.room_id == room_id)
            .and_then(|room| room.participants.iter_mut().find(|p| p.identity == identity));

        match participant {
            Some(p) if p.can_publish != can_publish => {
                p.can_publish = can_publish;
                true
            }
            _ => false,
        }
    }

    /// Look up one room (deep copy).
    pub async fn find_room(&self, room_id: &str) -> Option<Room> {
        self.rooms
            .read()
            .await
            .iter()
            .find(|r| r.room_id == room_id)
            .cloned()
    }

    /// Serialization-ready copy of the whole table, in insertion order.
    pub async fn snapshot(&self) -> Vec<Room> {
        self.rooms.read().await.clone()
    }

    /// Number of rooms currently held.
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}
