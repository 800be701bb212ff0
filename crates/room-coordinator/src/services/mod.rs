//! Service layer for the Room Coordinator.
//!
//! This module contains services that interact with external systems
//! and encapsulate business logic.
//!
//! # Components
//!
//! - `credential_issuer` - Access grants, consulting current room state
//! - `event_processor` - Applies webhook events to the room state store
//! - `livekit_client` - HTTP client for the media server management API
//! - `notifier` - Best-effort chat announcements
//! - `permissions` - Participant publish permission updates
//! - `resync` - Full state pull from the media server
//! - `webhook` - Webhook signature verification and parsing

pub mod credential_issuer;
pub mod event_processor;
pub mod livekit_client;
pub mod notifier;
pub mod permissions;
pub mod resync;
pub mod webhook;

pub use credential_issuer::{CredentialIssuer, IssuedToken};
pub use event_processor::{EventOutcome, EventProcessor};
pub use livekit_client::{LiveKitClient, MediaServerClient};
pub use notifier::{
    ChatNotifier, DisabledNotifier, Notification, NotificationDispatcher, TraqNotifier,
};
pub use resync::{ResyncError, Resynchronizer};
pub use webhook::{WebhookEvent, WebhookVerifier};
