//! UpdateOrchestrator processor.
//!
//! The UpdateOrchestrator is responsible for:
//! - Serializing read-modify-write per event id
//! - Merging a partial update onto the stored event and writing it back
//! - Comparing the stored status against the merged one
//! - Emitting `StatusChanged` when the status moved
//!
//! A status change needs a slot in the notification queue. The slot is
//! reserved before the write, while the per-id lock is held, and filled right
//! after the write commits with no await point in between. A full queue
//! therefore delays the write instead of the notification, and notifications
//! for one id reach the `NotificationDispatcher` in commit order.

use crate::entities::{Event, EventPatch};
use crate::events::{StatusChanged, StatusChangedSender};
use crate::state_machine;
use crate::store::{EventStore, StoreError};
use crate::utils::KeyedLock;
use kanau::processor::Processor;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Errors that can occur while applying an update.
#[derive(Debug, Error)]
pub enum UpdateError {
    /// No event with this id exists.
    #[error("event not found: {0}")]
    NotFound(Uuid),

    /// The store failed or refused the write.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

/// Command: apply `patch` to the event `id`.
#[derive(Debug, Clone)]
pub struct UpdateEvent {
    pub id: Uuid,
    pub patch: EventPatch,
}

/// Applies partial updates and schedules status change notifications.
pub struct UpdateOrchestrator {
    store: Arc<dyn EventStore>,
    locks: KeyedLock<Uuid>,
    status_tx: StatusChangedSender,
}

impl UpdateOrchestrator {
    /// Create a new UpdateOrchestrator.
    ///
    /// # Arguments
    ///
    /// * `store` - Event store holding the canonical events
    /// * `status_tx` - Sender for StatusChanged events
    pub fn new(store: Arc<dyn EventStore>, status_tx: StatusChangedSender) -> Self {
        Self {
            store,
            locks: KeyedLock::new(),
            status_tx,
        }
    }

    /// Apply a partial update to one event.
    pub async fn apply_update(&self, id: Uuid, patch: EventPatch) -> Result<Event, UpdateError> {
        self.process(UpdateEvent { id, patch }).await
    }
}

impl Processor<UpdateEvent> for UpdateOrchestrator {
    type Output = Event;
    type Error = UpdateError;

    async fn process(&self, cmd: UpdateEvent) -> Result<Event, UpdateError> {
        let _guard = self.locks.lock(cmd.id).await;

        let stored = self
            .store
            .get(cmd.id)
            .await?
            .ok_or(UpdateError::NotFound(cmd.id))?;
        let previous_status = stored.status;
        let updated = stored.merged(&cmd.patch);
        let status_changed = state_machine::detect(previous_status, updated.status);

        // Dropped unused if the write fails.
        let permit = if status_changed {
            self.status_tx.reserve().await.ok()
        } else {
            None
        };

        if !self.store.put(cmd.id, updated.clone()).await? {
            return Err(StoreError::Rejected(cmd.id).into());
        }
        info!(event_id = %cmd.id, "Event updated");

        if status_changed {
            info!(
                event_id = %cmd.id,
                from = %previous_status,
                to = %updated.status,
                "Event status changed"
            );
            match permit {
                Some(permit) => {
                    permit.send(StatusChanged {
                        event_id: cmd.id,
                        new_status: updated.status,
                    });
                    debug!(event_id = %cmd.id, "Queued status change notification");
                }
                None => warn!(
                    event_id = %cmd.id,
                    "Notification dispatcher stopped, status change not published"
                ),
            }
        }

        Ok(updated)
    }
}
