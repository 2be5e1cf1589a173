//! NotificationDispatcher processor.
//!
//! The NotificationDispatcher is responsible for:
//! - Receiving `StatusChanged` from the queue
//! - Reconnecting the publisher when it has lost its channel
//! - Encoding the status change payload
//! - Publishing it to the configured durable queue
//!
//! Delivery is best effort past this point. A notification whose publish
//! fails is logged, counted in [`DispatchStats`] and dropped: there is no
//! retry and no outbox. The client whose update triggered it already got
//! its success response and cannot learn about the failure.

use crate::events::{StatusChanged, StatusChangedReceiver};
use crate::publisher::{NotificationPublisher, PublishError};
use kanau::processor::Processor;
use lineprov_sdk::objects::StatusChangeNotification;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Counters for published and dropped notifications.
#[derive(Debug, Default)]
pub struct DispatchStats {
    published: AtomicU64,
    failed: AtomicU64,
}

impl DispatchStats {
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// NotificationDispatcher delivers status changes to the broker.
pub struct NotificationDispatcher {
    publisher: Arc<NotificationPublisher>,
    queue: String,
    status_rx: StatusChangedReceiver,
    shutdown_rx: watch::Receiver<bool>,
    stats: Arc<DispatchStats>,
}

impl NotificationDispatcher {
    /// Create a new NotificationDispatcher.
    ///
    /// # Arguments
    ///
    /// * `publisher` - Shared broker publisher
    /// * `queue` - Name of the queue the bet-maker consumes
    /// * `status_rx` - Receiver for StatusChanged events
    /// * `shutdown_rx` - Receiver for shutdown signal
    pub fn new(
        publisher: Arc<NotificationPublisher>,
        queue: impl Into<String>,
        status_rx: StatusChangedReceiver,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            publisher,
            queue: queue.into(),
            status_rx,
            shutdown_rx,
            stats: Arc::new(DispatchStats::default()),
        }
    }

    /// Handle to this dispatcher's counters.
    pub fn stats(&self) -> Arc<DispatchStats> {
        self.stats.clone()
    }

    /// Run the NotificationDispatcher.
    ///
    /// On shutdown, notifications already queued are still published before
    /// returning.
    pub async fn run(mut self) {
        info!(queue = %self.queue, "NotificationDispatcher started");

        loop {
            tokio::select! {
                biased;

                // Check for shutdown; a dropped sender counts as one
                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        info!("NotificationDispatcher received shutdown signal");
                        break;
                    }
                }

                // Receive StatusChanged events
                event = self.status_rx.recv() => match event {
                    Some(event) => self.dispatch(event).await,
                    None => {
                        info!("StatusChanged channel closed");
                        break;
                    }
                },
            }
        }

        self.status_rx.close();
        while let Some(event) = self.status_rx.recv().await {
            self.dispatch(event).await;
        }

        info!(
            published = self.stats.published(),
            failed = self.stats.failed(),
            "NotificationDispatcher shutdown complete"
        );
    }

    async fn dispatch(&self, event: StatusChanged) {
        debug!(event = ?event, "Received StatusChanged");
        if let Err(e) = self.process(event).await {
            error!(
                event_id = %event.event_id,
                status = %event.new_status,
                error = %e,
                "Status change notification dropped"
            );
        }
    }
}

impl Processor<StatusChanged> for NotificationDispatcher {
    type Output = ();
    type Error = PublishError;

    async fn process(&self, event: StatusChanged) -> Result<(), PublishError> {
        if !self.publisher.is_connected() {
            if let Err(e) = self.publisher.connect().await {
                warn!(error = %e, "Broker reconnect failed");
            }
        }

        let payload = StatusChangeNotification::build(event.event_id, event.new_status);
        match self.publisher.publish(&self.queue, &payload).await {
            Ok(()) => {
                self.stats.published.fetch_add(1, Ordering::Relaxed);
                info!(
                    event_id = %event.event_id,
                    status = %event.new_status,
                    "Status change published"
                );
                Ok(())
            }
            Err(e) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }
}
