//! HTTP routes for the Room Coordinator.
//!
//! Defines the Axum router and application state.

use crate::auth::{BearerValidator, SigningCredentials};
use crate::config::Config;
use crate::errors::RcError;
use crate::handlers;
use crate::middleware::{http_metrics_middleware, require_auth, AuthState};
use crate::services::{
    CredentialIssuer, EventProcessor, MediaServerClient, NotificationDispatcher, WebhookVerifier,
};
use crate::state::{Broadcaster, RoomStateStore};
use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Authoritative room table.
    pub store: Arc<RoomStateStore>,

    /// Observer fan-out.
    pub broadcaster: Arc<Broadcaster>,

    /// Media server management API.
    pub media_client: Arc<dyn MediaServerClient>,

    /// Access grant minting.
    pub issuer: Arc<CredentialIssuer>,

    /// Webhook event application.
    pub events: Arc<EventProcessor>,

    /// Webhook signature verification.
    pub webhook_verifier: WebhookVerifier,

    /// Bearer credential validation.
    pub bearer_validator: Arc<BearerValidator>,

    /// Cancelled on shutdown; long-lived observer connections end with it.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Wire the core components together around a fresh store.
    ///
    /// # Errors
    ///
    /// Returns `RcError::Configuration` if a configured public key cannot be
    /// parsed.
    pub fn new(
        config: Config,
        media_client: Arc<dyn MediaServerClient>,
        notifications: NotificationDispatcher,
    ) -> Result<Self, RcError> {
        let store = Arc::new(RoomStateStore::new());
        let broadcaster = Arc::new(Broadcaster::new(Arc::clone(&store)));
        let credentials = SigningCredentials::from_parts(
            config.livekit_api_key.clone(),
            config.livekit_api_secret.clone(),
        );

        let issuer = Arc::new(CredentialIssuer::new(
            Arc::clone(&store),
            Arc::clone(&broadcaster),
            credentials.clone(),
            config.access_token_ttl_seconds,
        ));
        let events = Arc::new(EventProcessor::new(
            Arc::clone(&store),
            Arc::clone(&broadcaster),
            notifications,
        ));
        let bearer_validator = Arc::new(BearerValidator::from_pem_keys(
            &config.auth_public_keys_pem,
            config.jwt_clock_skew_seconds,
        )?);

        Ok(Self {
            config,
            store,
            broadcaster,
            media_client,
            issuer,
            events,
            webhook_verifier: WebhookVerifier::new(credentials),
            bearer_validator,
            shutdown: CancellationToken::new(),
        })
    }
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/api/ping`, `/api/health` - Liveness (public)
/// - `/api/rooms`, `/api/rooms/:room_id` - Room state (public)
/// - `/api/ws` - Observer websocket (public)
/// - `/api/webhook` - Media server notifications (signed)
/// - `/api/token` - Access grants (authenticated)
/// - `/api/rooms/:room_id/participants` - Permission updates (authenticated)
/// - `/metrics` - Prometheus metrics (public, unversioned)
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - 30 second request timeout
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let auth_state = Arc::new(AuthState {
        validator: Arc::clone(&state.bearer_validator),
    });

    let public_routes = Router::new()
        .route("/api/ping", get(handlers::ping))
        .route("/api/health", get(handlers::health_check))
        .route("/api/rooms", get(handlers::list_rooms))
        .route("/api/rooms/:room_id", get(handlers::get_room))
        .route("/api/ws", get(handlers::ws_handler))
        .route("/api/webhook", post(handlers::receive_webhook))
        .with_state(state.clone());

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    let protected_routes = Router::new()
        .route("/api/token", get(handlers::get_token))
        .route(
            "/api/rooms/:room_id/participants",
            patch(handlers::update_participants),
        )
        .route_layer(middleware::from_fn_with_state(auth_state, require_auth))
        .with_state(state);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer (innermost)
    // 2. TraceLayer
    // 3. http_metrics_middleware (outermost)
    public_routes
        .merge(metrics_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(middleware::from_fn(http_metrics_middleware))
}
