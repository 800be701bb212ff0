//! HTTP request handlers for the Room Coordinator.

pub mod health;
pub mod metrics;
pub mod rooms;
pub mod token;
pub mod webhook;
pub mod ws;

pub use health::{health_check, ping};
pub use metrics::metrics_handler;
pub use rooms::{get_room, list_rooms, update_participants};
pub use token::get_token;
pub use webhook::receive_webhook;
pub use ws::ws_handler;
