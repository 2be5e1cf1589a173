//! In-process events feeding the notification pipeline.
//!
//! # Event Flow
//!
//! 1. `UpdateOrchestrator` commits an update and emits `StatusChanged`
//! 2. `NotificationDispatcher` encodes it and publishes it to the broker

pub mod channels;
pub mod types;

pub use channels::{
    DEFAULT_CHANNEL_BUFFER, StatusChangedReceiver, StatusChangedSender, status_changed_channel,
};
pub use types::StatusChanged;
