//! Transport Session - one broker connection shared by every call.
//!
//! Owns the connection, the correlation table and the table sweeper. With
//! [`ReplyRouting::Shared`] it holds exactly one long-lived subscription,
//! `RSP/DB/{db_id}/{sender_module}/{sender_id}/+`, whose handler parses the
//! reply topic and completes the matching correlation entry. With
//! [`ReplyRouting::PerCall`] calls open exact subscriptions instead, and
//! their handler goes through the same table.
//!
//! A failed call never tears the session down; only [`Session::disconnect`]
//! (or dropping the last handle) does.

use crate::adapters::pending::{cleanup_task, CorrelationTable};
use crate::domain::config::{ClientConfig, ReplyRouting};
use crate::domain::error::OrmResult;
use crate::domain::topics::{wildcard_reply_filter, RequestTopic, ResponseTopic};
use bytes::Bytes;
use shared_bus::{Connector, Message, MessageHandler, Transport, TransportError};
use shared_types::Identity;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// A connected client session.
pub struct Session {
    identity: Identity,
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    table: Arc<CorrelationTable>,
    /// Wildcard reply filter, present in shared routing mode
    reply_filter: Option<String>,
    sweeper: JoinHandle<()>,
    connected: AtomicBool,
}

impl Session {
    /// Connect to the broker named in `config` and install reply routing.
    ///
    /// # Errors
    ///
    /// - `OrmError::Config` if the configuration does not validate
    /// - `OrmError::Transport` if the broker is unreachable or refuses the
    ///   wildcard subscription
    pub async fn connect(config: ClientConfig, connector: &dyn Connector) -> OrmResult<Arc<Self>> {
        config.validate()?;
        let identity = config.identity();

        let transport = connector.connect(&identity.broker_addr).await?;
        let table = Arc::new(CorrelationTable::new(config.request_timeout()));

        let reply_filter = match config.reply_routing {
            ReplyRouting::Shared => {
                let filter = wildcard_reply_filter(&identity);
                if let Err(e) = transport.subscribe(&filter, reply_router(table.clone())).await {
                    transport.disconnect().await;
                    return Err(e.into());
                }
                Some(filter)
            }
            ReplyRouting::PerCall => None,
        };

        let sweeper = tokio::spawn(cleanup_task(table.clone(), config.cleanup_interval()));

        info!(
            broker = %identity.broker_addr,
            db_id = %identity.db_id,
            sender_module = %identity.sender_module,
            sender_id = %identity.sender_id,
            routing = %config.reply_routing,
            timeout_ms = config.request_timeout_ms,
            "Session connected"
        );

        Ok(Arc::new(Self {
            identity,
            config,
            transport,
            table,
            reply_filter,
            sweeper,
            connected: AtomicBool::new(true),
        }))
    }

    /// Publish an encoded request.
    pub async fn publish(&self, topic: &RequestTopic, payload: Bytes) -> Result<(), TransportError> {
        let topic = topic.to_string();
        self.transport.publish(&topic, payload).await?;
        debug!(topic = %topic, "Request published");
        Ok(())
    }

    /// Subscribe to the reply topic of a single call.
    pub async fn subscribe_exact(&self, topic: &ResponseTopic) -> Result<(), TransportError> {
        self.transport
            .subscribe(&topic.to_string(), reply_router(self.table.clone()))
            .await
    }

    /// Drop a per-call subscription. Failures are logged, never returned.
    pub async fn unsubscribe(&self, topic: &ResponseTopic) {
        let topic = topic.to_string();
        if let Err(e) = self.transport.unsubscribe(&topic).await {
            warn!(topic = %topic, error = %e, "Failed to release reply subscription");
        }
    }

    /// Remove the wildcard subscription, stop the sweeper and close the
    /// connection. Calling it twice is harmless.
    pub async fn disconnect(&self) {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return;
        }

        if let Some(filter) = &self.reply_filter {
            if let Err(e) = self.transport.unsubscribe(filter).await {
                debug!(filter = %filter, error = %e, "Wildcard unsubscribe failed");
            }
        }
        self.sweeper.abort();
        self.transport.disconnect().await;

        info!(sender_id = %self.identity.sender_id, "Session disconnected");
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && self.transport.is_connected()
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn reply_routing(&self) -> ReplyRouting {
        self.config.reply_routing
    }

    pub fn request_timeout(&self) -> Duration {
        self.config.request_timeout()
    }

    /// Filter of the long-lived reply subscription, if any.
    pub fn reply_filter(&self) -> Option<&str> {
        self.reply_filter.as_deref()
    }

    pub fn table(&self) -> &Arc<CorrelationTable> {
        &self.table
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("identity", &self.identity)
            .field("routing", &self.config.reply_routing)
            .field("connected", &self.connected.load(Ordering::Relaxed))
            .field("table", &self.table)
            .finish()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.sweeper.abort();
    }
}

/// Delivery callback completing the correlation entry named by the reply
/// topic. Runs on the transport's dispatch task.
fn reply_router(table: Arc<CorrelationTable>) -> MessageHandler {
    Arc::new(move |message: Message| match ResponseTopic::parse(&message.topic) {
        Ok(topic) => {
            table.complete(&topic.request_id, message.payload);
        }
        Err(e) => {
            debug!(topic = %message.topic, error = %e, "Ignoring reply on unparseable topic");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::correlation::RequestId;
    use crate::domain::error::OrmError;
    use crate::domain::topics::request_topic;
    use shared_bus::InMemoryBroker;
    use shared_types::Operation;
    use tokio::sync::oneshot;
    use tokio::time::timeout;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_session_is_shareable_across_tasks() {
        assert_send_sync::<Session>();
        assert_send_sync::<Arc<Session>>();
    }

    fn config(routing: ReplyRouting) -> ClientConfig {
        ClientConfig {
            reply_routing: routing,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_connect_installs_one_wildcard_subscription() {
        let broker = InMemoryBroker::new();
        let session = Session::connect(config(ReplyRouting::Shared), &broker).await.unwrap();

        assert!(session.is_connected());
        assert_eq!(broker.subscription_count(), 1);
        assert!(broker.has_subscription("RSP/DB/db-0/BACKEND/backend-0/+"));
        assert_eq!(session.reply_filter(), Some("RSP/DB/db-0/BACKEND/backend-0/+"));
    }

    #[tokio::test]
    async fn test_per_call_routing_has_no_wildcard() {
        let broker = InMemoryBroker::new();
        let session = Session::connect(config(ReplyRouting::PerCall), &broker).await.unwrap();

        assert_eq!(broker.subscription_count(), 0);
        assert!(session.reply_filter().is_none());
    }

    #[tokio::test]
    async fn test_connect_unreachable() {
        let broker = InMemoryBroker::with_address("memory://elsewhere");
        let result = Session::connect(ClientConfig::default(), &broker).await;
        assert!(matches!(
            result,
            Err(OrmError::Transport(TransportError::Unreachable { .. }))
        ));
    }

    #[tokio::test]
    async fn test_connect_rejected_subscription_closes_connection() {
        let broker = InMemoryBroker::new();
        broker.reject_subscribes(true);

        let result = Session::connect(ClientConfig::default(), &broker).await;
        assert!(matches!(
            result,
            Err(OrmError::Transport(TransportError::SubscribeRejected { .. }))
        ));
        assert_eq!(broker.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_connect_invalid_config() {
        let broker = InMemoryBroker::new();
        let invalid = ClientConfig {
            request_timeout_ms: 0,
            ..Default::default()
        };
        assert!(matches!(
            Session::connect(invalid, &broker).await,
            Err(OrmError::Config(_))
        ));
        assert_eq!(broker.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_wildcard_routes_reply_through_table() {
        let broker = InMemoryBroker::new();
        let session = Session::connect(ClientConfig::default(), &broker).await.unwrap();
        let responder = broker.open().unwrap();

        let id = RequestId::new();
        let (tx, rx) = oneshot::channel::<Bytes>();
        let handler = Box::new(move |payload: Bytes| {
            let _ = tx.send(payload);
        });
        session.table().register(id, handler, None).unwrap();

        let reply = request_topic(session.identity(), id, Operation::Read).to_response();
        responder
            .publish(&reply.to_string(), Bytes::from_static(b"{\"id\":\"x\"}"))
            .await
            .unwrap();

        let payload = timeout(Duration::from_secs(1), rx).await.unwrap().unwrap();
        assert_eq!(payload, Bytes::from_static(b"{\"id\":\"x\"}"));
        assert!(!session.table().is_pending(&id));
    }

    #[tokio::test]
    async fn test_exact_subscription_lifecycle() {
        let broker = InMemoryBroker::new();
        let session = Session::connect(config(ReplyRouting::PerCall), &broker).await.unwrap();

        let reply = request_topic(session.identity(), RequestId::new(), Operation::Create).to_response();
        session.subscribe_exact(&reply).await.unwrap();
        assert!(broker.has_subscription(&reply.to_string()));

        session.unsubscribe(&reply).await;
        assert!(!broker.has_subscription(&reply.to_string()));
    }

    #[tokio::test]
    async fn test_disconnect_releases_everything() {
        let broker = InMemoryBroker::new();
        let session = Session::connect(ClientConfig::default(), &broker).await.unwrap();
        assert_eq!(broker.connection_count(), 1);

        session.disconnect().await;
        session.disconnect().await;

        assert!(!session.is_connected());
        assert_eq!(broker.connection_count(), 0);
        assert_eq!(broker.subscription_count(), 0);

        let request = request_topic(session.identity(), RequestId::new(), Operation::Read);
        assert_eq!(
            session.publish(&request, Bytes::new()).await,
            Err(TransportError::NotConnected)
        );
    }
}
