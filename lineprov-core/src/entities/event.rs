use crate::framework::DatabaseProcessor;
use crate::store::StoreError;
use kanau::processor::Processor;
use lineprov_sdk::objects::{Coefficient, EventResponse, EventStatus, UpdateEventRequest};
use rust_decimal::Decimal;
use time::OffsetDateTime;
use uuid::Uuid;

/// A betting event.
///
/// The store owns the canonical copy; everything else works on clones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub id: Uuid,
    pub coefficient: Coefficient,
    pub status: EventStatus,
    pub deadline: OffsetDateTime,
}

/// Partial update of an event. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventPatch {
    pub coefficient: Option<Coefficient>,
    pub status: Option<EventStatus>,
    pub deadline: Option<OffsetDateTime>,
}

impl Event {
    /// A fresh event with a random id, starting as `NotFinished`.
    pub fn create(coefficient: Coefficient, deadline: OffsetDateTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            coefficient,
            status: EventStatus::NotFinished,
            deadline,
        }
    }

    /// Copy of this event with the patch applied. The id never changes.
    pub fn merged(&self, patch: &EventPatch) -> Event {
        Event {
            id: self.id,
            coefficient: patch.coefficient.unwrap_or(self.coefficient),
            status: patch.status.unwrap_or(self.status),
            deadline: patch.deadline.unwrap_or(self.deadline),
        }
    }

    /// Whether the event's deadline is still ahead of `now`.
    pub fn is_current(&self, now: OffsetDateTime) -> bool {
        self.deadline > now
    }
}

impl From<UpdateEventRequest> for EventPatch {
    fn from(value: UpdateEventRequest) -> Self {
        Self {
            coefficient: value.coefficient,
            status: value.status,
            deadline: value.deadline,
        }
    }
}

impl From<&Event> for EventResponse {
    fn from(value: &Event) -> Self {
        EventResponse {
            uid: value.id,
            coefficient: value.coefficient,
            status: value.status,
            deadline: value.deadline,
        }
    }
}

/// Row shape of the `events` table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct EventRow {
    id: Uuid,
    coefficient: Decimal,
    status: i16,
    deadline: OffsetDateTime,
}

impl TryFrom<EventRow> for Event {
    type Error = StoreError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        let coefficient = Coefficient::new(row.coefficient)
            .map_err(|e| StoreError::Corrupt(format!("event {}: {e}", row.id)))?;
        let status = EventStatus::from_code(row.status.into()).ok_or_else(|| {
            StoreError::Corrupt(format!("event {}: unknown status {}", row.id, row.status))
        })?;
        Ok(Event {
            id: row.id,
            coefficient,
            status,
            deadline: row.deadline,
        })
    }
}

#[derive(Debug, Clone)]
/// Fetch one event by id.
pub struct GetEventById {
    pub id: Uuid,
}

impl Processor<GetEventById> for DatabaseProcessor {
    type Output = Option<Event>;
    type Error = StoreError;
    #[tracing::instrument(skip_all, err, name = "SQL:GetEventById")]
    async fn process(&self, query: GetEventById) -> Result<Option<Event>, StoreError> {
        let row = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT id, coefficient, status, deadline
            FROM events
            WHERE id = $1
            "#,
        )
        .bind(query.id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Event::try_from).transpose()
    }
}

#[derive(Debug, Clone)]
/// Fetch every event in creation order.
pub struct ListEvents;

impl Processor<ListEvents> for DatabaseProcessor {
    type Output = Vec<Event>;
    type Error = StoreError;
    #[tracing::instrument(skip_all, err, name = "SQL:ListEvents")]
    async fn process(&self, _query: ListEvents) -> Result<Vec<Event>, StoreError> {
        let rows = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT id, coefficient, status, deadline
            FROM events
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Event::try_from).collect()
    }
}

#[derive(Debug, Clone)]
/// Insert a newly created event.
pub struct InsertEvent {
    pub event: Event,
}

impl Processor<InsertEvent> for DatabaseProcessor {
    type Output = ();
    type Error = StoreError;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertEvent")]
    async fn process(&self, insert: InsertEvent) -> Result<(), StoreError> {
        let event = insert.event;
        let result = sqlx::query(
            r#"
            INSERT INTO events (id, coefficient, status, deadline)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(event.id)
        .bind(event.coefficient.value())
        .bind(i16::from(event.status.code()))
        .bind(event.deadline)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Duplicate(event.id));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
/// Overwrite the mutable columns of an existing event.
///
/// Reports `false` when no row with that id exists.
pub struct ReplaceEvent {
    pub id: Uuid,
    pub event: Event,
}

impl Processor<ReplaceEvent> for DatabaseProcessor {
    type Output = bool;
    type Error = StoreError;
    #[tracing::instrument(skip_all, err, name = "SQL:ReplaceEvent")]
    async fn process(&self, cmd: ReplaceEvent) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE events
            SET coefficient = $2, status = $3, deadline = $4
            WHERE id = $1
            "#,
        )
        .bind(cmd.id)
        .bind(cmd.event.coefficient.value())
        .bind(i16::from(cmd.event.status.code()))
        .bind(cmd.event.deadline)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn coefficient(s: &str) -> Coefficient {
        Coefficient::from_str(s).unwrap()
    }

    #[test]
    fn test_create_starts_not_finished() {
        let deadline = OffsetDateTime::now_utc();
        let a = Event::create(coefficient("2.50"), deadline);
        let b = Event::create(coefficient("2.50"), deadline);
        assert_eq!(a.status, EventStatus::NotFinished);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_merge_keeps_omitted_fields() {
        let event = Event::create(coefficient("2.50"), OffsetDateTime::UNIX_EPOCH);

        let status_only = event.merged(&EventPatch {
            status: Some(EventStatus::Won),
            ..Default::default()
        });
        assert_eq!(status_only.id, event.id);
        assert_eq!(status_only.coefficient, event.coefficient);
        assert_eq!(status_only.deadline, event.deadline);
        assert_eq!(status_only.status, EventStatus::Won);

        let coefficient_only = event.merged(&EventPatch {
            coefficient: Some(coefficient("3.10")),
            ..Default::default()
        });
        assert_eq!(coefficient_only.status, EventStatus::NotFinished);
        assert_eq!(coefficient_only.coefficient.to_string(), "3.10");

        assert_eq!(event.merged(&EventPatch::default()), event);
    }

    #[test]
    fn test_is_current() {
        let now = OffsetDateTime::now_utc();
        let event = Event::create(coefficient("1.50"), now + time::Duration::minutes(5));
        assert!(event.is_current(now));
        assert!(!event.is_current(now + time::Duration::minutes(5)));
    }

    #[test]
    fn test_row_with_unknown_status_is_corrupt() {
        let row = EventRow {
            id: Uuid::new_v4(),
            coefficient: Decimal::from_str("2.00").unwrap(),
            status: 7,
            deadline: OffsetDateTime::UNIX_EPOCH,
        };
        assert!(matches!(Event::try_from(row), Err(StoreError::Corrupt(_))));
    }
}
