//! # Transport Interface
//!
//! The publish/subscribe primitives every broker adapter provides. Delivery
//! callbacks run on the transport's own dispatch task, never on the caller's,
//! and must not block.

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Errors from transport operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The broker could not be reached.
    #[error("Broker unreachable at {addr}: {reason}")]
    Unreachable { addr: String, reason: String },

    /// The connection was closed.
    #[error("Not connected to broker")]
    NotConnected,

    /// The topic name is not valid for publishing.
    #[error("Invalid topic name: {0}")]
    InvalidTopic(String),

    /// The subscription filter is malformed.
    #[error("Invalid topic filter: {0}")]
    InvalidFilter(String),

    /// The broker refused the subscription.
    #[error("Subscribe to {filter} rejected: {reason}")]
    SubscribeRejected { filter: String, reason: String },

    /// The broker refused the publish.
    #[error("Publish to {topic} rejected: {reason}")]
    PublishRejected { topic: String, reason: String },
}

/// A message delivered by the broker.
#[derive(Clone, PartialEq, Eq)]
pub struct Message {
    /// Concrete topic the message was published on.
    pub topic: String,
    /// Raw payload.
    pub payload: Bytes,
}

impl Message {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("topic", &self.topic)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

/// Callback invoked for every message matching a subscription.
pub type MessageHandler = Arc<dyn Fn(Message) + Send + Sync + 'static>;

/// A live connection to a broker.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Subscribe `handler` to every topic matching `filter`.
    ///
    /// Subscribing again with the same filter replaces the handler.
    async fn subscribe(&self, filter: &str, handler: MessageHandler) -> Result<(), TransportError>;

    /// Remove the subscription for `filter`. Unknown filters are ignored.
    async fn unsubscribe(&self, filter: &str) -> Result<(), TransportError>;

    /// Publish `payload` on `topic`.
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), TransportError>;

    /// Close the connection and drop all its subscriptions.
    async fn disconnect(&self);

    /// Whether the connection is still open.
    fn is_connected(&self) -> bool;
}

/// Factory establishing a [`Transport`] to a broker address.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connect to the broker at `broker_addr`.
    ///
    /// # Errors
    ///
    /// `TransportError::Unreachable` if no broker answers at that address.
    async fn connect(&self, broker_addr: &str) -> Result<Arc<dyn Transport>, TransportError>;
}
