//! Media server webhook handler.

use crate::errors::RcError;
use crate::models::StatusResponse;
use crate::routes::AppState;
use crate::services::webhook::{check_content_type, WebhookEvent};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::Json;
use std::sync::Arc;
use tracing::instrument;

/// Handler for POST /api/webhook
///
/// Checks the content type, verifies the signature over the raw body, then
/// parses and applies the event. Broadcast and notification failures never
/// reach the response.
#[instrument(skip_all, name = "rc.webhook.receive")]
pub async fn receive_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<StatusResponse>, RcError> {
    check_content_type(
        headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok()),
    )?;

    state.webhook_verifier.verify(
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok()),
        &body,
    )?;

    let event = WebhookEvent::parse(&body)?;
    state.events.process(event).await;

    Ok(Json(StatusResponse::ok()))
}
