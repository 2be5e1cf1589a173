use super::{EventStore, StoreError};
use crate::entities::Event;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Process-local event store.
///
/// Events live only as long as the process. Listing preserves creation
/// order.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    events: HashMap<Uuid, Event>,
    order: Vec<Uuid>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored events.
    pub async fn len(&self) -> usize {
        self.inner.read().await.events.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn get(&self, id: Uuid) -> Result<Option<Event>, StoreError> {
        Ok(self.inner.read().await.events.get(&id).cloned())
    }

    async fn put(&self, id: Uuid, event: Event) -> Result<bool, StoreError> {
        if event.id != id {
            return Ok(false);
        }
        let mut inner = self.inner.write().await;
        match inner.events.get_mut(&id) {
            Some(stored) => {
                *stored = event;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list(&self) -> Result<Vec<Event>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .order
            .iter()
            .filter_map(|id| inner.events.get(id).cloned())
            .collect())
    }

    async fn insert(&self, event: Event) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.events.contains_key(&event.id) {
            return Err(StoreError::Duplicate(event.id));
        }
        inner.order.push(event.id);
        inner.events.insert(event.id, event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lineprov_sdk::objects::{Coefficient, EventStatus};
    use std::str::FromStr;
    use time::OffsetDateTime;

    fn event(coefficient: &str) -> Event {
        Event::create(
            Coefficient::from_str(coefficient).unwrap(),
            OffsetDateTime::now_utc(),
        )
    }

    #[tokio::test]
    async fn test_insert_get_list() {
        let store = InMemoryEventStore::new();
        let first = event("1.50");
        let second = event("2.50");
        store.insert(first.clone()).await.unwrap();
        store.insert(second.clone()).await.unwrap();

        assert_eq!(store.get(first.id).await.unwrap(), Some(first.clone()));
        assert_eq!(store.get(Uuid::new_v4()).await.unwrap(), None);
        assert_eq!(store.list().await.unwrap(), vec![first, second]);
    }

    #[tokio::test]
    async fn test_duplicate_insert_rejected() {
        let store = InMemoryEventStore::new();
        let e = event("1.50");
        store.insert(e.clone()).await.unwrap();
        assert!(matches!(store.insert(e).await, Err(StoreError::Duplicate(_))));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_put_replaces_existing_only() {
        let store = InMemoryEventStore::new();
        let e = event("1.50");
        store.insert(e.clone()).await.unwrap();

        let mut won = e.clone();
        won.status = EventStatus::Won;
        assert!(store.put(e.id, won.clone()).await.unwrap());
        assert_eq!(store.get(e.id).await.unwrap(), Some(won));

        let stranger = event("3.00");
        assert!(!store.put(stranger.id, stranger.clone()).await.unwrap());
        // id mismatch between key and payload
        assert!(!store.put(e.id, stranger).await.unwrap());
        assert_eq!(store.len().await, 1);
    }
}
