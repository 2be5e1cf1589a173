use super::{EventStore, StoreError};
use crate::entities::{Event, GetEventById, InsertEvent, ListEvents, ReplaceEvent};
use crate::framework::DatabaseProcessor;
use async_trait::async_trait;
use kanau::processor::Processor;
use sqlx::PgPool;
use uuid::Uuid;

/// Event store backed by the Postgres `events` table.
#[derive(Debug, Clone)]
pub struct PgEventStore {
    processor: DatabaseProcessor,
}

impl PgEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            processor: DatabaseProcessor { pool },
        }
    }
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn get(&self, id: Uuid) -> Result<Option<Event>, StoreError> {
        self.processor.process(GetEventById { id }).await
    }

    async fn put(&self, id: Uuid, event: Event) -> Result<bool, StoreError> {
        if event.id != id {
            return Ok(false);
        }
        self.processor.process(ReplaceEvent { id, event }).await
    }

    async fn list(&self) -> Result<Vec<Event>, StoreError> {
        self.processor.process(ListEvents).await
    }

    async fn insert(&self, event: Event) -> Result<(), StoreError> {
        self.processor.process(InsertEvent { event }).await
    }
}
