//! In-memory room state and its observer fan-out.

pub mod broadcaster;
pub mod store;

pub use broadcaster::{BroadcastReport, Broadcaster, ObserverId, ObserverRegistration};
pub use store::RoomStateStore;
