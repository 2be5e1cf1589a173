//! Event storage.
//!
//! The update pipeline only needs `get`, `put` and `list`; `insert` is
//! used by the create path. Implementations decide how events are kept.

mod memory;
mod postgres;

pub use memory::InMemoryEventStore;
pub use postgres::PgEventStore;

use crate::entities::Event;
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

/// Errors raised by an [`EventStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The store refused to write the event.
    #[error("write rejected for event {0}")]
    Rejected(Uuid),

    /// An event with this id already exists.
    #[error("event already exists: {0}")]
    Duplicate(Uuid),

    /// A stored row could not be turned back into an event.
    #[error("corrupt event record: {0}")]
    Corrupt(String),
}

/// Keyed storage for events.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Look up an event by id.
    async fn get(&self, id: Uuid) -> Result<Option<Event>, StoreError>;

    /// Replace the stored event with this id.
    ///
    /// Returns `false` if the store did not accept the write (for example
    /// because no event with that id exists).
    async fn put(&self, id: Uuid, event: Event) -> Result<bool, StoreError>;

    /// All events, in creation order.
    async fn list(&self) -> Result<Vec<Event>, StoreError>;

    /// Add a newly created event.
    async fn insert(&self, event: Event) -> Result<(), StoreError>;
}
