//! Event type definitions for the notification pipeline.

use lineprov_sdk::objects::EventStatus;
use uuid::Uuid;

/// Emitted by the update orchestrator once a status change has been
/// committed to the store.
///
/// Carries only what the broker message needs; the dispatcher does not
/// re-read the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChanged {
    pub event_id: Uuid,
    pub new_status: EventStatus,
}
