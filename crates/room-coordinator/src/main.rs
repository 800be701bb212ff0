//! Room Coordinator
//!
//! Entry point for the room state coordination service.

use room_coordinator::auth::SigningCredentials;
use room_coordinator::config::Config;
use room_coordinator::observability::metrics::init_metrics_recorder;
use room_coordinator::routes::{self, AppState};
use room_coordinator::services::notifier::NOTIFICATION_QUEUE_CAPACITY;
use room_coordinator::services::{
    ChatNotifier, DisabledNotifier, LiveKitClient, MediaServerClient, NotificationDispatcher,
    Resynchronizer, TraqNotifier,
};
use room_coordinator::tasks::{start_notification_worker, start_resync_task};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "room_coordinator=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Room Coordinator");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        livekit_host = %config.livekit_host,
        bind_address = %config.bind_address,
        public_keys = config.auth_public_keys_pem.len(),
        notifications = config.notifier.is_some(),
        "Configuration loaded successfully"
    );
    if config.livekit_api_key.is_none() || config.livekit_api_secret.is_none() {
        warn!("LIVEKIT_API_KEY or LIVEKIT_API_SECRET missing; tokens and webhooks will be refused");
    }

    // Metrics recorder must exist before any metric is recorded
    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics recorder: {}", e);
        e
    })?;

    let upstream_timeout = Duration::from_secs(config.upstream_timeout_seconds);
    let media_client: Arc<dyn MediaServerClient> = Arc::new(LiveKitClient::new(
        config.livekit_host.clone(),
        SigningCredentials::from_parts(
            config.livekit_api_key.clone(),
            config.livekit_api_secret.clone(),
        ),
        upstream_timeout,
    )?);

    let notifier: Arc<dyn ChatNotifier> = match &config.notifier {
        Some(notifier_config) => Arc::new(TraqNotifier::new(notifier_config, upstream_timeout)?),
        None => {
            info!("TRAQ_ACCESS_TOKEN not set, chat notifications disabled");
            Arc::new(DisabledNotifier)
        }
    };
    let (dispatcher, notification_rx) = NotificationDispatcher::channel(NOTIFICATION_QUEUE_CAPACITY);

    let bind_address = config.bind_address.clone();
    let resync_interval = config.resync_interval_seconds;
    let drain_seconds = config.drain_seconds;

    let state = Arc::new(AppState::new(config, Arc::clone(&media_client), dispatcher)?);

    // The engine cannot start from an unknown state
    let resynchronizer = Arc::new(Resynchronizer::new(
        Arc::clone(&media_client),
        Arc::clone(&state.store),
    ));
    resynchronizer.resync().await.map_err(|e| {
        error!("Startup resync failed: {}", e);
        e
    })?;

    let cancel_token = state.shutdown.clone();

    let notification_handle = tokio::spawn(start_notification_worker(
        notifier,
        notification_rx,
        cancel_token.child_token(),
    ));

    let resync_handle = if resync_interval > 0 {
        Some(tokio::spawn(start_resync_task(
            Arc::clone(&resynchronizer),
            Arc::clone(&state.broadcaster),
            Duration::from_secs(resync_interval),
            cancel_token.child_token(),
        )))
    } else {
        info!("RESYNC_INTERVAL_SECONDS=0, periodic resync disabled");
        None
    };

    let app = routes::build_routes(state, metrics_handle);

    let addr: SocketAddr = bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("Room Coordinator listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(drain_seconds, cancel_token.clone()))
        .await?;

    // Stop background tasks
    cancel_token.cancel();
    if let Err(e) = notification_handle.await {
        warn!("Notification worker ended abnormally: {}", e);
    }
    if let Some(handle) = resync_handle {
        if let Err(e) = handle.await {
            warn!("Resync task ended abnormally: {}", e);
        }
    }

    info!("Room Coordinator shutdown complete");

    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
/// Returns when a shutdown signal is received and drain period is complete.
///
/// Cancels `cancel_token` at the end so observer websockets close; the
/// server would otherwise wait on them forever.
async fn shutdown_signal(drain_secs: u64, cancel_token: CancellationToken) {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    if drain_secs > 0 {
        warn!("Draining connections for {} seconds...", drain_secs);
        tokio::time::sleep(Duration::from_secs(drain_secs)).await;
        info!("Drain period complete");
    } else {
        info!("Skipping drain period (RC_DRAIN_SECONDS=0)");
    }

    cancel_token.cancel();
}
