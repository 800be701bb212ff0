//! Access grant handler.

use crate::auth::UserClaims;
use crate::errors::RcError;
use crate::models::{TokenQuery, TokenResponse};
use crate::routes::AppState;
use axum::extract::{Query, State};
use axum::{Extension, Json};
use std::sync::Arc;
use tracing::instrument;

/// Handler for GET /api/token?room=<id>&isWebinar=<bool>
///
/// Requires a bearer credential; the caller's `name` claim becomes the user
/// id of the grant.
#[instrument(skip_all, name = "rc.token.issue")]
pub async fn get_token(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<UserClaims>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<TokenResponse>, RcError> {
    let room = query.room.unwrap_or_default();
    let is_webinar = parse_webinar_flag(query.is_webinar.as_deref())?;

    let issued = state
        .issuer
        .issue_token(&room, claims.user_id(), is_webinar)
        .await?;

    Ok(Json(TokenResponse {
        token: issued.token,
    }))
}

/// `isWebinar` is optional and defaults to `false`.
fn parse_webinar_flag(value: Option<&str>) -> Result<bool, RcError> {
    match value {
        None | Some("") | Some("false") => Ok(false),
        Some("true") => Ok(true),
        Some(_) => Err(RcError::BadRequest(
            "isWebinar must be true or false".to_string(),
        )),
    }
}
