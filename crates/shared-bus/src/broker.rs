//! # In-Memory Broker
//!
//! A single-process pub/sub broker implementing [`Connector`] and
//! [`Transport`]. Suitable for single-node operation and tests; networked
//! deployments plug a different adapter behind the same traits.
//!
//! Each connection owns a dedicated dispatch task draining an unbounded
//! queue, so publishers never block on slow subscribers and handlers never
//! run on the publisher's task. A message is queued once per connection with
//! at least one matching filter, then handed to every matching handler of
//! that connection.

use crate::topic::{filter_matches, validate_filter, validate_topic_name};
use crate::transport::{Connector, Message, MessageHandler, Transport, TransportError};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// Fault switches used to exercise failure paths.
#[derive(Debug, Default)]
struct BrokerFaults {
    reject_publish: AtomicBool,
    reject_subscribe: AtomicBool,
}

/// Filters registered on one connection.
#[derive(Default)]
struct SubscriptionTable {
    handlers: RwLock<HashMap<String, MessageHandler>>,
}

impl SubscriptionTable {
    fn matches(&self, topic: &str) -> bool {
        self.handlers
            .read()
            .keys()
            .any(|filter| filter_matches(filter, topic))
    }

    fn matching_handlers(&self, topic: &str) -> Vec<MessageHandler> {
        self.handlers
            .read()
            .iter()
            .filter(|(filter, _)| filter_matches(filter, topic))
            .map(|(_, handler)| handler.clone())
            .collect()
    }

    fn insert(&self, filter: &str, handler: MessageHandler) {
        self.handlers.write().insert(filter.to_string(), handler);
    }

    fn remove(&self, filter: &str) -> bool {
        self.handlers.write().remove(filter).is_some()
    }

    fn contains(&self, filter: &str) -> bool {
        self.handlers.read().contains_key(filter)
    }

    fn len(&self) -> usize {
        self.handlers.read().len()
    }

    fn clear(&self) {
        self.handlers.write().clear();
    }
}

/// Broker-side view of a connection.
struct ConnectionSink {
    queue: mpsc::UnboundedSender<Message>,
    subscriptions: Arc<SubscriptionTable>,
}

struct BrokerInner {
    address: String,
    online: AtomicBool,
    faults: BrokerFaults,
    connections: RwLock<HashMap<u64, ConnectionSink>>,
    next_connection_id: AtomicU64,
    messages_published: AtomicU64,
}

impl BrokerInner {
    /// Queue `message` on every connection subscribed to its topic.
    fn route(&self, message: &Message) -> usize {
        let connections = self.connections.read();
        let mut delivered = 0;
        for (id, sink) in connections.iter() {
            if !sink.subscriptions.matches(&message.topic) {
                continue;
            }
            if sink.queue.send(message.clone()).is_ok() {
                delivered += 1;
            } else {
                trace!(connection_id = id, "Dispatch queue closed, message dropped");
            }
        }
        delivered
    }

    fn remove_connection(&self, id: u64) {
        self.connections.write().remove(&id);
    }
}

/// In-process broker reachable at a single address.
#[derive(Clone)]
pub struct InMemoryBroker {
    inner: Arc<BrokerInner>,
}

impl InMemoryBroker {
    /// Address used by [`InMemoryBroker::new`].
    pub const DEFAULT_ADDRESS: &'static str = "memory://local";

    /// Create a broker listening at [`Self::DEFAULT_ADDRESS`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_address(Self::DEFAULT_ADDRESS)
    }

    /// Create a broker listening at `address`.
    #[must_use]
    pub fn with_address(address: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                address: address.into(),
                online: AtomicBool::new(true),
                faults: BrokerFaults::default(),
                connections: RwLock::new(HashMap::new()),
                next_connection_id: AtomicU64::new(1),
                messages_published: AtomicU64::new(0),
            }),
        }
    }

    /// Address this broker accepts connections on.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.inner.address
    }

    /// Take the broker offline or bring it back.
    ///
    /// While offline, new connections are refused and every publish or
    /// subscribe on existing connections is rejected.
    pub fn set_online(&self, online: bool) {
        self.inner.online.store(online, Ordering::SeqCst);
    }

    /// Reject every publish while `reject` is true.
    pub fn reject_publishes(&self, reject: bool) {
        self.inner.faults.reject_publish.store(reject, Ordering::SeqCst);
    }

    /// Reject every subscribe while `reject` is true.
    pub fn reject_subscribes(&self, reject: bool) {
        self.inner
            .faults
            .reject_subscribe
            .store(reject, Ordering::SeqCst);
    }

    /// Number of open connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.inner.connections.read().len()
    }

    /// Total number of filters registered across all connections.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.inner
            .connections
            .read()
            .values()
            .map(|sink| sink.subscriptions.len())
            .sum()
    }

    /// Whether any connection holds a subscription with exactly `filter`.
    #[must_use]
    pub fn has_subscription(&self, filter: &str) -> bool {
        self.inner
            .connections
            .read()
            .values()
            .any(|sink| sink.subscriptions.contains(filter))
    }

    /// Total number of accepted publishes.
    #[must_use]
    pub fn messages_published(&self) -> u64 {
        self.inner.messages_published.load(Ordering::Relaxed)
    }

    /// Open a connection without going through address resolution.
    ///
    /// Must be called from within a tokio runtime: the connection's dispatch
    /// task is spawned on it.
    ///
    /// # Errors
    ///
    /// `TransportError::Unreachable` if the broker is offline or no runtime
    /// is available.
    pub fn open(&self) -> Result<BrokerConnection, TransportError> {
        if !self.inner.online.load(Ordering::SeqCst) {
            return Err(TransportError::Unreachable {
                addr: self.inner.address.clone(),
                reason: "broker offline".to_string(),
            });
        }

        let runtime =
            tokio::runtime::Handle::try_current().map_err(|e| TransportError::Unreachable {
                addr: self.inner.address.clone(),
                reason: e.to_string(),
            })?;

        let id = self.inner.next_connection_id.fetch_add(1, Ordering::Relaxed);
        let (queue, receiver) = mpsc::unbounded_channel();
        let subscriptions = Arc::new(SubscriptionTable::default());

        self.inner.connections.write().insert(
            id,
            ConnectionSink {
                queue,
                subscriptions: subscriptions.clone(),
            },
        );
        runtime.spawn(dispatch_loop(id, receiver, subscriptions.clone()));

        debug!(connection_id = id, broker = %self.inner.address, "Connection opened");

        Ok(BrokerConnection {
            id,
            broker: self.inner.clone(),
            subscriptions,
            connected: AtomicBool::new(true),
        })
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for InMemoryBroker {
    async fn connect(&self, broker_addr: &str) -> Result<Arc<dyn Transport>, TransportError> {
        if broker_addr != self.inner.address {
            return Err(TransportError::Unreachable {
                addr: broker_addr.to_string(),
                reason: "no broker at this address".to_string(),
            });
        }
        let connection = self.open()?;
        Ok(Arc::new(connection))
    }
}

/// Receiver loop of one connection. Ends when the broker drops the queue.
async fn dispatch_loop(
    connection_id: u64,
    mut receiver: mpsc::UnboundedReceiver<Message>,
    subscriptions: Arc<SubscriptionTable>,
) {
    while let Some(message) = receiver.recv().await {
        let handlers = subscriptions.matching_handlers(&message.topic);
        if handlers.is_empty() {
            // Unsubscribed between routing and dispatch.
            trace!(connection_id, topic = %message.topic, "No handler for message");
            continue;
        }
        for handler in handlers {
            handler(message.clone());
        }
    }
    debug!(connection_id, "Dispatch loop stopped");
}

/// A connection to an [`InMemoryBroker`].
///
/// Dropping the connection disconnects it.
pub struct BrokerConnection {
    id: u64,
    broker: Arc<BrokerInner>,
    subscriptions: Arc<SubscriptionTable>,
    connected: AtomicBool,
}

impl BrokerConnection {
    /// Broker-assigned connection id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Number of filters held by this connection.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    fn ensure_connected(&self) -> Result<(), TransportError> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(TransportError::NotConnected)
        }
    }

    fn close(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            self.broker.remove_connection(self.id);
            self.subscriptions.clear();
            debug!(connection_id = self.id, "Connection closed");
        }
    }
}

#[async_trait]
impl Transport for BrokerConnection {
    async fn subscribe(&self, filter: &str, handler: MessageHandler) -> Result<(), TransportError> {
        self.ensure_connected()?;
        validate_filter(filter)?;

        if !self.broker.online.load(Ordering::SeqCst) {
            return Err(TransportError::SubscribeRejected {
                filter: filter.to_string(),
                reason: "broker offline".to_string(),
            });
        }
        if self.broker.faults.reject_subscribe.load(Ordering::SeqCst) {
            return Err(TransportError::SubscribeRejected {
                filter: filter.to_string(),
                reason: "rejected by broker".to_string(),
            });
        }

        self.subscriptions.insert(filter, handler);
        debug!(connection_id = self.id, filter = filter, "Subscribed");
        Ok(())
    }

    async fn unsubscribe(&self, filter: &str) -> Result<(), TransportError> {
        self.ensure_connected()?;
        if self.subscriptions.remove(filter) {
            debug!(connection_id = self.id, filter = filter, "Unsubscribed");
        }
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), TransportError> {
        self.ensure_connected()?;
        validate_topic_name(topic)?;

        if !self.broker.online.load(Ordering::SeqCst) {
            return Err(TransportError::PublishRejected {
                topic: topic.to_string(),
                reason: "broker offline".to_string(),
            });
        }
        if self.broker.faults.reject_publish.load(Ordering::SeqCst) {
            return Err(TransportError::PublishRejected {
                topic: topic.to_string(),
                reason: "rejected by broker".to_string(),
            });
        }

        self.broker.messages_published.fetch_add(1, Ordering::Relaxed);
        let message = Message::new(topic, payload);
        let receivers = self.broker.route(&message);

        if receivers == 0 {
            warn!(connection_id = self.id, topic = topic, "Message dropped (no subscribers)");
        } else {
            debug!(
                connection_id = self.id,
                topic = topic,
                receivers = receivers,
                "Message published"
            );
        }
        Ok(())
    }

    async fn disconnect(&self) {
        self.close();
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

impl Drop for BrokerConnection {
    fn drop(&mut self) {
        self.close();
    }
}
