//! Application state shared across all request handlers.

use lineprov_core::events::StatusChangedSender;
use lineprov_core::processors::{DispatchStats, UpdateOrchestrator};
use lineprov_core::publisher::NotificationPublisher;
use lineprov_core::store::EventStore;
use std::sync::Arc;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    /// Canonical event storage.
    pub store: Arc<dyn EventStore>,
    /// Applies updates and schedules status change notifications.
    pub orchestrator: Arc<UpdateOrchestrator>,
    /// Shared broker publisher, exposed for health reporting.
    pub publisher: Arc<NotificationPublisher>,
    /// Counters of the running notification dispatcher.
    pub dispatch_stats: Arc<DispatchStats>,
}

impl AppState {
    /// Create a new AppState around the given store and publisher.
    pub fn new(
        store: Arc<dyn EventStore>,
        publisher: Arc<NotificationPublisher>,
        status_tx: StatusChangedSender,
        dispatch_stats: Arc<DispatchStats>,
    ) -> Self {
        Self {
            orchestrator: Arc::new(UpdateOrchestrator::new(store.clone(), status_tx)),
            store,
            publisher,
            dispatch_stats,
        }
    }
}
