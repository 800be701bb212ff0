//! Room Coordinator Library
//!
//! Mirrors the media server's rooms and participants in memory and keeps a
//! set of websocket observers in sync with that view:
//!
//! - Full resync from the media server at startup and on an interval
//! - Incremental updates from signed media server webhooks
//! - Snapshot broadcast to every observer after each state change
//! - Access grants whose publish permission depends on current room state
//!
//! # Architecture
//!
//! Handler -> Service -> State:
//!
//! ```text
//! routes/mod.rs -> handlers/*.rs -> services/*.rs -> state/*.rs
//! ```
//!
//! # Modules
//!
//! - `auth` - Bearer validation and media server grants
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Authentication and HTTP metrics
//! - `models` - Room state and API models
//! - `observability` - Prometheus metrics
//! - `routes` - Axum router setup
//! - `services` - Media server client, event processing, credentials
//! - `state` - Room state store and broadcaster
//! - `tasks` - Background tasks

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod routes;
pub mod services;
pub mod state;
pub mod tasks;
