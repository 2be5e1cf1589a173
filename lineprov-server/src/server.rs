//! Axum server setup and router configuration.

use crate::api;
use crate::shutdown::shutdown_signal;
use crate::state::AppState;
use axum::{Json, Router, extract::State, response::IntoResponse, routing::get};
use serde::Serialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Build the main application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health check endpoint
        .route("/health", get(health_check))
        .merge(api::events::router())
        // Add state to all routes
        .with_state(state)
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    broker_connected: bool,
    notifications_published: u64,
    notifications_failed: u64,
}

/// Returns OK while the server is running, plus notification pipeline
/// counters. A disconnected broker does not make the service unhealthy.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        broker_connected: state.publisher.is_connected(),
        notifications_published: state.dispatch_stats.published(),
        notifications_failed: state.dispatch_stats.failed(),
    })
}

/// Run the server with graceful shutdown support.
pub async fn run_server(router: Router, addr: SocketAddr) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use crate::shutdown::finish_dispatch;
    use lineprov_core::entities::EventPatch;
    use lineprov_core::events::status_changed_channel;
    use lineprov_core::processors::{DispatchStats, NotificationDispatcher};
    use lineprov_core::publisher::{MemoryBroker, NotificationPublisher};
    use lineprov_core::store::{EventStore, InMemoryEventStore};
    use lineprov_sdk::objects::{EventResponse, EventStatus, StatusChangeNotification};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::watch;
    use tokio::task::JoinHandle;
    use tower::ServiceExt;

    const QUEUE: &str = "event-status";

    struct Harness {
        router: Router,
        state: AppState,
        broker: MemoryBroker,
        store: Arc<InMemoryEventStore>,
        stats: Arc<DispatchStats>,
        dispatcher: JoinHandle<()>,
        shutdown: watch::Sender<bool>,
    }

    async fn harness() -> Harness {
        let broker = MemoryBroker::new();
        let store = Arc::new(InMemoryEventStore::new());
        let publisher = Arc::new(NotificationPublisher::new(Arc::new(broker.clone())));
        publisher.connect().await.unwrap();

        let (status_tx, status_rx) = status_changed_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let dispatcher =
            NotificationDispatcher::new(publisher.clone(), QUEUE, status_rx, shutdown_rx);
        let stats = dispatcher.stats();
        let dispatcher = tokio::spawn(dispatcher.run());

        let state = AppState::new(store.clone(), publisher, status_tx, stats.clone());
        Harness {
            router: build_router(state.clone()),
            state,
            broker,
            store,
            stats,
            dispatcher,
            shutdown: shutdown_tx,
        }
    }

    async fn send(
        router: &Router,
        method: Method,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
        };
        (status, json)
    }

    /// Wait until the dispatcher has handled `count` notifications.
    async fn settled(stats: &DispatchStats, count: u64) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while stats.published() + stats.failed() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    async fn create(h: &Harness, coefficient: &str) -> EventResponse {
        let (status, json) = send(
            &h.router,
            Method::POST,
            "/events",
            Some(serde_json::json!({
                "coefficient": coefficient,
                "deadline": "2099-01-01T00:00:00Z",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        serde_json::from_value(json).unwrap()
    }

    #[tokio::test]
    async fn test_status_update_publishes_one_notification() {
        let h = harness().await;
        let event = create(&h, "2.50").await;
        assert_eq!(event.status, EventStatus::NotFinished);
        assert_eq!(event.coefficient.to_string(), "2.50");

        let (status, json) = send(
            &h.router,
            Method::PUT,
            &format!("/events/{}", event.uid),
            Some(serde_json::json!({ "status": 2 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], 2);
        assert_eq!(json["coefficient"], "2.50");

        let stored = h.store.get(event.uid).await.unwrap().unwrap();
        assert_eq!(stored.status, EventStatus::Won);

        settled(&h.stats, 1).await;
        let published = h.broker.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].queue, QUEUE);
        assert!(published[0].persistent);
        assert_eq!(h.broker.is_durable(QUEUE), Some(true));
        assert_eq!(
            StatusChangeNotification::decode(&published[0].payload).unwrap(),
            (event.uid, EventStatus::Won)
        );
    }

    #[tokio::test]
    async fn test_coefficient_update_publishes_nothing() {
        let h = harness().await;
        let event = create(&h, "2.50").await;

        let (status, json) = send(
            &h.router,
            Method::PUT,
            &format!("/events/{}", event.uid),
            Some(serde_json::json!({ "coefficient": "3.10" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["coefficient"], "3.10");
        assert_eq!(json["status"], 1);

        // A later status change is the first thing the broker sees.
        send(
            &h.router,
            Method::PUT,
            &format!("/events/{}", event.uid),
            Some(serde_json::json!({ "status": 3 })),
        )
        .await;
        settled(&h.stats, 1).await;
        let published = h.broker.published();
        assert_eq!(published.len(), 1);
        assert_eq!(
            StatusChangeNotification::decode(&published[0].payload).unwrap(),
            (event.uid, EventStatus::Lost)
        );
        assert_eq!(h.stats.published(), 1);
    }

    #[tokio::test]
    async fn test_broker_outage_does_not_fail_update() {
        let h = harness().await;
        let event = create(&h, "2.50").await;
        h.broker.set_online(false);

        let (status, json) = send(
            &h.router,
            Method::PUT,
            &format!("/events/{}", event.uid),
            Some(serde_json::json!({ "status": 3 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], 3);
        assert_eq!(
            h.store.get(event.uid).await.unwrap().unwrap().status,
            EventStatus::Lost
        );

        settled(&h.stats, 1).await;
        assert_eq!(h.stats.failed(), 1);
        assert!(h.broker.published().is_empty());

        let (_, health) = send(&h.router, Method::GET, "/health", None).await;
        assert_eq!(health["broker_connected"], false);
        assert_eq!(health["notifications_failed"], 1);
    }

    #[tokio::test]
    async fn test_unknown_event_is_404() {
        let h = harness().await;
        let uri = format!("/events/{}", uuid::Uuid::new_v4());

        let (status, json) = send(&h.router, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["detail"], "Event Not Found");

        let (status, _) = send(
            &h.router,
            Method::PUT,
            &uri,
            Some(serde_json::json!({ "status": 2 })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invalid_coefficient_rejected() {
        let h = harness().await;
        for bad in [serde_json::json!("1.00"), serde_json::json!("2.555"), serde_json::json!(0.5)] {
            let (status, _) = send(
                &h.router,
                Method::POST,
                "/events",
                Some(serde_json::json!({
                    "coefficient": bad,
                    "deadline": "2099-01-01T00:00:00Z",
                })),
            )
            .await;
            assert!(status.is_client_error(), "{bad} accepted with {status}");
        }
        assert!(h.store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_current_filters_by_deadline() {
        let h = harness().await;
        let open = create(&h, "1.50").await;
        let (status, _) = send(
            &h.router,
            Method::POST,
            "/events",
            Some(serde_json::json!({
                "coefficient": "1.75",
                "deadline": "2000-01-01T00:00:00Z",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, all) = send(&h.router, Method::GET, "/events", None).await;
        assert_eq!(all.as_array().unwrap().len(), 2);

        let (_, current) = send(&h.router, Method::GET, "/events?current=true", None).await;
        let current = current.as_array().unwrap();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0]["uid"], open.uid.to_string());
    }

    #[tokio::test]
    async fn test_health_reports_pipeline() {
        let h = harness().await;
        let (status, json) = send(&h.router, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["broker_connected"], true);
        assert_eq!(json["notifications_published"], 0);
    }

    #[tokio::test]
    async fn test_health_answers_while_publish_is_stalled() {
        let h = harness().await;
        let event = create(&h, "2.50").await;
        h.broker.hold_confirms(true);

        let (status, _) = send(
            &h.router,
            Method::PUT,
            &format!("/events/{}", event.uid),
            Some(serde_json::json!({ "status": 2 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(h.stats.published() + h.stats.failed(), 0);

        let (status, health) = tokio::time::timeout(
            Duration::from_secs(1),
            send(&h.router, Method::GET, "/health", None),
        )
        .await
        .expect("health check waited on the broker");
        assert_eq!(status, StatusCode::OK);
        assert_eq!(health["broker_connected"], true);

        h.broker.hold_confirms(false);
        settled(&h.stats, 1).await;
        assert_eq!(h.stats.published(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_publishes_updates_finishing_late() {
        let h = harness().await;
        let event = create(&h, "2.50").await;

        // An update whose client already left, still running when the
        // server stops accepting requests.
        let late = {
            let orchestrator = h.state.orchestrator.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                let patch = EventPatch {
                    status: Some(EventStatus::Lost),
                    ..Default::default()
                };
                orchestrator.apply_update(event.uid, patch).await
            })
        };
        drop(h.router);
        drop(h.state);

        finish_dispatch(h.dispatcher, h.shutdown, Duration::from_secs(5)).await;
        late.await.unwrap().unwrap();

        let published = h.broker.published();
        assert_eq!(published.len(), 1);
        assert_eq!(
            StatusChangeNotification::decode(&published[0].payload).unwrap(),
            (event.uid, EventStatus::Lost)
        );
    }

    #[tokio::test]
    async fn test_shutdown_gives_up_waiting_after_grace() {
        let h = harness().await;
        let event = create(&h, "2.50").await;
        send(
            &h.router,
            Method::PUT,
            &format!("/events/{}", event.uid),
            Some(serde_json::json!({ "status": 2 })),
        )
        .await;

        // `h.state` keeps a sender alive for the whole wait.
        tokio::time::timeout(
            Duration::from_secs(5),
            finish_dispatch(h.dispatcher, h.shutdown, Duration::from_millis(50)),
        )
        .await
        .unwrap();
        assert_eq!(h.stats.published(), 1);
        drop(h.state);
    }
}
