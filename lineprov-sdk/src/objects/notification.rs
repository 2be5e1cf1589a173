//! Status change notification published to the message broker.
//!
//! The bet-maker consumes these from a durable queue to settle bets. The
//! payload is a compact JSON object `{"event_id": "<uuid>", "status": <code>}`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::status::EventStatus;

/// Body of a status change message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChangeNotification {
    pub event_id: String,
    pub status: EventStatus,
}

/// Errors produced when decoding a notification body.
#[derive(Debug, thiserror::Error)]
pub enum NotificationDecodeError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid event id: {0}")]
    EventId(#[from] uuid::Error),
}

impl StatusChangeNotification {
    /// Create a notification for the given event and status.
    pub fn new(event_id: Uuid, status: EventStatus) -> Self {
        Self {
            event_id: event_id.hyphenated().to_string(),
            status,
        }
    }

    /// Build the wire payload for a status change.
    pub fn build(event_id: Uuid, status: EventStatus) -> Vec<u8> {
        Self::new(event_id, status).to_bytes()
    }

    /// Serialize into the wire payload.
    pub fn to_bytes(&self) -> Vec<u8> {
        // A struct of a string and an integer has no failing serialization path.
        serde_json::to_vec(self).unwrap_or_default()
    }

    /// Decode a wire payload back into the event id and status.
    pub fn decode(bytes: &[u8]) -> Result<(Uuid, EventStatus), NotificationDecodeError> {
        let notification: StatusChangeNotification = serde_json::from_slice(bytes)?;
        let event_id = Uuid::parse_str(&notification.event_id)?;
        Ok((event_id, notification.status))
    }
}
