//! In-process broker.
//!
//! Behaves like a single broker node: durable queue declarations, persistent
//! messages, an on/off switch that severs every open channel, and a switch
//! that holds publisher confirms the way a broker under a resource alarm
//! does. Used for `memory://` broker URLs and in tests.

use super::{BrokerChannel, BrokerConnector, ConnectionError, PublishError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;

/// A message accepted by the [`MemoryBroker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub queue: String,
    pub payload: Vec<u8>,
    pub persistent: bool,
}

#[derive(Debug)]
struct QueueState {
    durable: bool,
    declarations: usize,
}

#[derive(Debug)]
struct BrokerState {
    online: bool,
    // Bumped whenever the broker goes offline; channels from an older
    // generation are dead.
    generation: u64,
    connections: usize,
    queues: HashMap<String, QueueState>,
    published: Vec<PublishedMessage>,
}

/// Cloneable handle to one in-process broker.
#[derive(Debug, Clone)]
pub struct MemoryBroker {
    state: Arc<Mutex<BrokerState>>,
    // `true` while confirms are held back.
    confirms_held: Arc<watch::Sender<bool>>,
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBroker {
    /// A broker that is online with no queues.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BrokerState {
                online: true,
                generation: 0,
                connections: 0,
                queues: HashMap::new(),
                published: Vec::new(),
            })),
            confirms_held: Arc::new(watch::Sender::new(false)),
        }
    }

    fn state(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Take the broker up or down. Going down kills every open channel.
    pub fn set_online(&self, online: bool) {
        let mut state = self.state();
        if state.online && !online {
            state.generation += 1;
        }
        state.online = online;
    }

    /// While held, every publish waits for its confirm until released.
    pub fn hold_confirms(&self, held: bool) {
        self.confirms_held.send_replace(held);
    }

    /// Every accepted message, in acceptance order.
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.state().published.clone()
    }

    /// Payloads accepted for `queue`, in acceptance order.
    pub fn messages(&self, queue: &str) -> Vec<Vec<u8>> {
        self.state()
            .published
            .iter()
            .filter(|m| m.queue == queue)
            .map(|m| m.payload.clone())
            .collect()
    }

    /// Durability of a declared queue, `None` if never declared.
    pub fn is_durable(&self, queue: &str) -> Option<bool> {
        self.state().queues.get(queue).map(|q| q.durable)
    }

    /// How many times `queue` has been declared.
    pub fn declarations(&self, queue: &str) -> usize {
        self.state().queues.get(queue).map_or(0, |q| q.declarations)
    }

    /// Number of successful connects so far.
    pub fn connection_count(&self) -> usize {
        self.state().connections
    }
}

#[async_trait]
impl BrokerConnector for MemoryBroker {
    async fn connect(&self) -> Result<Box<dyn BrokerChannel>, ConnectionError> {
        let mut state = self.state();
        if !state.online {
            return Err(ConnectionError::Unreachable("memory broker is offline".into()));
        }
        state.connections += 1;
        Ok(Box::new(MemoryChannel {
            broker: self.clone(),
            generation: state.generation,
            closed: false,
        }))
    }
}

struct MemoryChannel {
    broker: MemoryBroker,
    generation: u64,
    closed: bool,
}

impl MemoryChannel {
    fn live_state(&self) -> Result<MutexGuard<'_, BrokerState>, PublishError> {
        let state = self.broker.state();
        if self.closed || !state.online || state.generation != self.generation {
            return Err(PublishError::Broker("channel closed".into()));
        }
        Ok(state)
    }
}

#[async_trait]
impl BrokerChannel for MemoryChannel {
    fn is_open(&self) -> bool {
        self.live_state().is_ok()
    }

    async fn declare_durable_queue(&mut self, queue: &str) -> Result<(), PublishError> {
        let mut state = self.live_state()?;
        let entry = state.queues.entry(queue.to_owned()).or_insert(QueueState {
            durable: true,
            declarations: 0,
        });
        entry.declarations += 1;
        Ok(())
    }

    async fn publish_persistent(
        &mut self,
        queue: &str,
        payload: &[u8],
    ) -> Result<(), PublishError> {
        let mut held = self.broker.confirms_held.subscribe();
        // Only fails once the sender is gone, which the broker handle prevents.
        let _ = held.wait_for(|held| !*held).await;

        let mut state = self.live_state()?;
        if !state.queues.contains_key(queue) {
            return Err(PublishError::Nacked(queue.to_owned()));
        }
        state.published.push(PublishedMessage {
            queue: queue.to_owned(),
            payload: payload.to_vec(),
            persistent: true,
        });
        Ok(())
    }

    async fn close(&mut self) {
        self.closed = true;
    }
}
