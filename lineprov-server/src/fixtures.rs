//! Demo events for local runs.

use lineprov_core::entities::Event;
use lineprov_core::store::{EventStore, StoreError};
use lineprov_sdk::objects::{Coefficient, CoefficientError};
use rand::Rng;
use rust_decimal::Decimal;
use time::OffsetDateTime;

/// Build one random open event: coefficient in (1, 4], deadline 5 to 30
/// minutes after `now`.
pub fn random_event(rng: &mut impl Rng, now: OffsetDateTime) -> Result<Event, CoefficientError> {
    let cents: i64 = rng.random_range(101..=400);
    let coefficient = Coefficient::new(Decimal::new(cents, 2))?;
    let minutes: i64 = rng.random_range(5..=30);
    Ok(Event::create(coefficient, now + time::Duration::minutes(minutes)))
}

/// Insert `count` random events into the store.
pub async fn seed(store: &dyn EventStore, count: usize) -> anyhow::Result<()> {
    let now = OffsetDateTime::now_utc();
    let events = {
        let mut rng = rand::rng();
        (0..count)
            .map(|_| random_event(&mut rng, now))
            .collect::<Result<Vec<_>, _>>()?
    };
    for event in events {
        store.insert(event).await.map_err(|e: StoreError| {
            tracing::error!(error = %e, "Failed to insert fixture event");
            e
        })?;
    }
    tracing::info!(count, "Seeded fixture events");
    Ok(())
}
