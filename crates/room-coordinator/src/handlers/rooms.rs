//! Room state handlers.

use crate::errors::RcError;
use crate::models::{Room, StatusResponse, UpdateParticipantsRequest};
use crate::routes::AppState;
use crate::services::permissions::update_participant_permissions;
use axum::extract::{Path, State};
use axum::Json;
use std::sync::Arc;
use tracing::instrument;

/// Handler for GET /api/rooms
///
/// Returns the same array observers receive over the websocket.
#[instrument(skip_all, name = "rc.rooms.list")]
pub async fn list_rooms(State(state): State<Arc<AppState>>) -> Json<Vec<Room>> {
    Json(state.store.snapshot().await)
}

/// Handler for GET /api/rooms/:room_id
#[instrument(skip(state), name = "rc.rooms.get")]
pub async fn get_room(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Result<Json<Room>, RcError> {
    state
        .store
        .find_room(&room_id)
        .await
        .map(Json)
        .ok_or_else(|| RcError::NotFound(format!("Room {room_id} not found")))
}

/// Handler for PATCH /api/rooms/:room_id/participants
///
/// Body: `{"users": [{"identity": "...", "canPublish": true}]}`
#[instrument(skip(state, request), name = "rc.rooms.update_participants")]
pub async fn update_participants(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
    Json(request): Json<UpdateParticipantsRequest>,
) -> Result<Json<StatusResponse>, RcError> {
    update_participant_permissions(
        state.media_client.as_ref(),
        &state.store,
        &state.broadcaster,
        &room_id,
        &request.users,
    )
    .await?;

    Ok(Json(StatusResponse::ok()))
}
