//! Durable notification publishing.
//!
//! [`NotificationPublisher`] owns the single process-wide broker channel.
//! It has an explicit lifecycle: `connect` on start, `disconnect` on stop.
//! Publishing never retries: when the channel is gone it fails fast with
//! [`PublishError::NotConnected`] and whoever called it decides whether to
//! reconnect.
//!
//! Every message goes to a durable queue with persistent delivery, and the
//! broker must confirm it before `publish` returns.

mod amqp;
mod memory;

pub use amqp::AmqpConnector;
pub use memory::{MemoryBroker, PublishedMessage};

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// The broker could not be reached or refused the session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("broker unreachable: {0}")]
    Unreachable(String),

    #[error("broker connection timed out after {0:?}")]
    Timeout(Duration),
}

/// A message could not be handed to the broker.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    #[error("publisher is not connected")]
    NotConnected,

    #[error("broker error: {0}")]
    Broker(String),

    #[error("broker refused message for queue {0}")]
    Nacked(String),
}

/// Opens sessions to a broker.
#[async_trait]
pub trait BrokerConnector: Send + Sync {
    /// Open a connection plus one logical channel.
    async fn connect(&self) -> Result<Box<dyn BrokerChannel>, ConnectionError>;
}

/// One logical channel on an open broker connection.
#[async_trait]
pub trait BrokerChannel: Send + Sync {
    /// Whether both the channel and its connection are still usable.
    fn is_open(&self) -> bool;

    /// Declare `queue` as durable. Declaring an existing queue is a no-op.
    async fn declare_durable_queue(&mut self, queue: &str) -> Result<(), PublishError>;

    /// Publish `payload` to `queue` with persistent delivery and wait for
    /// the broker's confirmation.
    async fn publish_persistent(&mut self, queue: &str, payload: &[u8])
    -> Result<(), PublishError>;

    /// Close the channel and its connection.
    async fn close(&mut self);
}

struct LiveChannel {
    channel: Box<dyn BrokerChannel>,
    declared: HashSet<String>,
}

impl LiveChannel {
    async fn publish(&mut self, queue: &str, payload: &[u8]) -> Result<(), PublishError> {
        if !self.declared.contains(queue) {
            self.channel.declare_durable_queue(queue).await?;
            self.declared.insert(queue.to_owned());
        }
        self.channel.publish_persistent(queue, payload).await
    }
}

/// Shared, reconnectable publisher.
///
/// Concurrent callers are serialized on the one channel.
pub struct NotificationPublisher {
    connector: Arc<dyn BrokerConnector>,
    live: Mutex<Option<LiveChannel>>,
    // Last known state, readable while a publish holds `live`.
    connected: AtomicBool,
}

impl NotificationPublisher {
    /// Create a disconnected publisher.
    pub fn new(connector: Arc<dyn BrokerConnector>) -> Self {
        Self {
            connector,
            live: Mutex::new(None),
            connected: AtomicBool::new(false),
        }
    }

    /// Establish the connection and channel.
    ///
    /// Does nothing when already connected; a dead channel is closed and
    /// replaced.
    pub async fn connect(&self) -> Result<(), ConnectionError> {
        let mut live = self.live.lock().await;
        if live.as_ref().is_some_and(|l| l.channel.is_open()) {
            return Ok(());
        }
        self.connected.store(false, Ordering::Release);
        if let Some(mut dead) = live.take() {
            debug!("Discarding dead broker channel");
            dead.channel.close().await;
        }
        let channel = self.connector.connect().await?;
        *live = Some(LiveChannel {
            channel,
            declared: HashSet::new(),
        });
        self.connected.store(true, Ordering::Release);
        info!("Connected to message broker");
        Ok(())
    }

    /// Declare `queue` durable (once per channel) and publish `payload`
    /// with persistent delivery.
    ///
    /// A broker-side failure drops the channel so the next `connect` starts
    /// fresh.
    pub async fn publish(&self, queue: &str, payload: &[u8]) -> Result<(), PublishError> {
        let mut live = self.live.lock().await;
        let Some(channel) = live.as_mut().filter(|l| l.channel.is_open()) else {
            self.connected.store(false, Ordering::Release);
            return Err(PublishError::NotConnected);
        };
        let result = channel.publish(queue, payload).await;
        if let Err(e) = &result {
            warn!(queue, error = %e, "Publish failed, dropping broker channel");
            self.connected.store(false, Ordering::Release);
            if let Some(mut broken) = live.take() {
                broken.channel.close().await;
            }
        }
        result
    }

    /// Release the channel and connection. No-op when disconnected.
    pub async fn disconnect(&self) {
        let mut live = self.live.lock().await;
        self.connected.store(false, Ordering::Release);
        if let Some(mut channel) = live.take() {
            channel.channel.close().await;
            info!("Disconnected from message broker");
        }
    }

    /// Whether a usable channel is currently held.
    ///
    /// Never waits: while a publish is in flight the last known state is
    /// reported instead of probing the channel.
    pub fn is_connected(&self) -> bool {
        match self.live.try_lock() {
            Ok(live) => live.as_ref().is_some_and(|l| l.channel.is_open()),
            Err(_) => self.connected.load(Ordering::Acquire),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn publisher(broker: &MemoryBroker) -> NotificationPublisher {
        NotificationPublisher::new(Arc::new(broker.clone()))
    }

    #[tokio::test]
    async fn test_publish_requires_connection() {
        let broker = MemoryBroker::new();
        let publisher = publisher(&broker);
        assert_eq!(
            publisher.publish("q", b"x").await,
            Err(PublishError::NotConnected)
        );
        assert!(broker.messages("q").is_empty());
    }

    #[tokio::test]
    async fn test_publish_declares_durable_queue_and_persists() {
        let broker = MemoryBroker::new();
        let publisher = publisher(&broker);
        publisher.connect().await.unwrap();

        publisher.publish("bets", b"one").await.unwrap();
        publisher.publish("bets", b"two").await.unwrap();

        assert_eq!(broker.is_durable("bets"), Some(true));
        assert_eq!(broker.declarations("bets"), 1);
        let messages = broker.published();
        assert_eq!(messages.len(), 2);
        assert!(messages.iter().all(|m| m.persistent && m.queue == "bets"));
        assert_eq!(broker.messages("bets"), vec![b"one".to_vec(), b"two".to_vec()]);
    }

    #[tokio::test]
    async fn test_connect_is_idempotent() {
        let broker = MemoryBroker::new();
        let publisher = publisher(&broker);
        publisher.connect().await.unwrap();
        publisher.connect().await.unwrap();
        assert_eq!(broker.connection_count(), 1);
    }

    #[tokio::test]
    async fn test_connect_fails_when_broker_down() {
        let broker = MemoryBroker::new();
        broker.set_online(false);
        let publisher = publisher(&broker);
        assert!(matches!(
            publisher.connect().await,
            Err(ConnectionError::Unreachable(_))
        ));
        assert!(!publisher.is_connected());
    }

    #[tokio::test]
    async fn test_outage_fails_fast_then_reconnects() {
        let broker = MemoryBroker::new();
        let publisher = publisher(&broker);
        publisher.connect().await.unwrap();

        broker.set_online(false);
        assert!(!publisher.is_connected());
        assert_eq!(
            publisher.publish("q", b"lost").await,
            Err(PublishError::NotConnected)
        );

        broker.set_online(true);
        publisher.connect().await.unwrap();
        publisher.publish("q", b"after").await.unwrap();
        assert_eq!(broker.messages("q"), vec![b"after".to_vec()]);
        assert_eq!(broker.connection_count(), 2);
        // the new channel declares the queue again
        assert_eq!(broker.declarations("q"), 2);
    }

    #[tokio::test]
    async fn test_disconnect_is_safe_twice() {
        let broker = MemoryBroker::new();
        let publisher = publisher(&broker);
        publisher.disconnect().await;
        publisher.connect().await.unwrap();
        publisher.disconnect().await;
        publisher.disconnect().await;
        assert!(!publisher.is_connected());
        assert_eq!(
            publisher.publish("q", b"x").await,
            Err(PublishError::NotConnected)
        );
    }

    #[tokio::test]
    async fn test_concurrent_publishes_all_land() {
        let broker = MemoryBroker::new();
        let publisher = Arc::new(publisher(&broker));
        publisher.connect().await.unwrap();

        let mut handles = Vec::new();
        for i in 0..32u8 {
            let publisher = publisher.clone();
            handles.push(tokio::spawn(async move {
                publisher.publish("q", &[i]).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        let mut seen: Vec<u8> = broker.messages("q").into_iter().map(|m| m[0]).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..32u8).collect::<Vec<_>>());
        assert_eq!(broker.declarations("q"), 1);
    }

    #[tokio::test]
    async fn test_is_connected_answers_during_stalled_publish() {
        let broker = MemoryBroker::new();
        let publisher = Arc::new(publisher(&broker));
        publisher.connect().await.unwrap();
        broker.hold_confirms(true);

        let pending = {
            let publisher = publisher.clone();
            tokio::spawn(async move { publisher.publish("q", b"slow").await })
        };
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(!pending.is_finished());
        assert!(publisher.is_connected());

        broker.hold_confirms(false);
        pending.await.unwrap().unwrap();
        assert_eq!(broker.messages("q"), vec![b"slow".to_vec()]);
    }

    #[tokio::test]
    async fn test_failed_publish_marks_disconnected() {
        let broker = MemoryBroker::new();
        let publisher = publisher(&broker);
        publisher.connect().await.unwrap();
        broker.set_online(false);
        assert!(publisher.publish("q", b"x").await.is_err());
        broker.set_online(true);
        // A channel from before the outage stays dead.
        assert!(!publisher.is_connected());
    }
}
