//! Processors for the status change pipeline.
//!
//! - `UpdateOrchestrator`: Applies updates, emits `StatusChanged`
//! - `NotificationDispatcher`: Receives `StatusChanged`, publishes to the broker

pub mod notification_dispatcher;
pub mod update_orchestrator;

pub use notification_dispatcher::{DispatchStats, NotificationDispatcher};
pub use update_orchestrator::{UpdateError, UpdateEvent, UpdateOrchestrator};
