//! Background tasks for the Room Coordinator.
//!
//! # Tasks
//!
//! - `resync_task` - Periodic recovery resync from the media server
//! - `notification_worker` - Delivers queued chat announcements

pub mod notification_worker;
pub mod resync_task;

pub use notification_worker::start_notification_worker;
pub use resync_task::start_resync_task;
