//! # Failure Paths
//!
//! Each failure is reported as exactly one error and never tears down the
//! session.

#[cfg(test)]
mod tests {
    use super::super::harness::{client_config, Harness};
    use orm_client::{CallExecutor, DbClient, OrmError, ReplyRouting};
    use serde::{Serialize, Serializer};
    use serde_json::json;
    use shared_bus::{InMemoryBroker, TransportError};
    use shared_types::{
        CreateRequest, CreateResponse, ErrorKind, Operation, ReadRequest, TIMEOUT_DESCRIPTION,
    };
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tokio::time::Instant;

    struct Unencodable;

    impl Serialize for Unencodable {
        fn serialize<S: Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("cannot encode"))
        }
    }

    // =========================================================================
    // TIMEOUT
    // =========================================================================

    /// No reply under a 2s timeout: one timeout error after the deadline.
    #[tokio::test(start_paused = true)]
    async fn test_no_reply_times_out() {
        let harness = Harness::start(Duration::from_secs(2)).await;
        harness.db.set_silent(true);

        let started = Instant::now();
        let response = harness.client.read(&ReadRequest { id: "x".into() }).await;

        assert!(started.elapsed() >= Duration::from_secs(2));
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].kind, ErrorKind::Timeout);
        assert!(response.errors[0].description.contains(TIMEOUT_DESCRIPTION));
        assert_eq!(response.value, serde_json::Value::Null);
        assert_eq!(harness.db.requests_handled(), 1);
        assert_eq!(harness.client.session().table().pending_count(), 0);
    }

    /// A reply arriving after the deadline is dropped and the next call works.
    #[tokio::test(start_paused = true)]
    async fn test_late_reply_is_ignored() {
        let harness = Harness::start(Duration::from_secs(2)).await;
        harness.db.store().create("x", json!(1)).unwrap();
        harness.db.set_reply_delay(Duration::from_secs(3));

        let late = harness.client.read(&ReadRequest { id: "x".into() }).await;
        assert_eq!(late.errors[0].kind, ErrorKind::Timeout);

        // Let the late reply arrive.
        tokio::time::sleep(Duration::from_secs(2)).await;
        let stats = harness.client.session().table().stats();
        assert_eq!(stats.total_unmatched.load(Ordering::Relaxed), 1);

        harness.db.set_reply_delay(Duration::ZERO);
        let read = harness.client.read(&ReadRequest { id: "x".into() }).await;
        assert!(read.errors.is_empty());
        assert_eq!(read.value, json!(1));
    }

    /// Per-call routing: the exact reply subscription is released on timeout.
    #[tokio::test(start_paused = true)]
    async fn test_per_call_timeout_releases_subscription() {
        let harness = Harness::with_routing(ReplyRouting::PerCall, Duration::from_secs(2)).await;
        harness.db.set_silent(true);
        let subscriptions_before = harness.broker.subscription_count();

        let started = Instant::now();
        let response = harness.client.read(&ReadRequest { id: "x".into() }).await;

        assert!(started.elapsed() >= Duration::from_secs(2));
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].kind, ErrorKind::Timeout);
        assert_eq!(harness.broker.subscription_count(), subscriptions_before);
        assert_eq!(harness.client.session().table().pending_count(), 0);
    }

    // =========================================================================
    // TRANSPORT
    // =========================================================================

    #[tokio::test]
    async fn test_unreachable_broker() {
        let broker = InMemoryBroker::with_address("memory://other");
        let config = client_config("backend-0", ReplyRouting::Shared, Duration::from_secs(1));

        let result = DbClient::connect(config, &broker).await;

        assert!(matches!(
            result,
            Err(OrmError::Transport(TransportError::Unreachable { .. }))
        ));
    }

    /// Publish rejected: one transport error, no orphaned exact subscription.
    #[tokio::test]
    async fn test_publish_failure_leaves_no_subscription() {
        let harness = Harness::with_routing(ReplyRouting::PerCall, Duration::from_secs(2)).await;
        let subscriptions_before = harness.broker.subscription_count();
        harness.broker.reject_publishes(true);

        let response = harness
            .client
            .create(&CreateRequest { id: "x".into(), value: json!(1) })
            .await;

        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].kind, ErrorKind::Transport);
        assert_eq!(harness.broker.subscription_count(), subscriptions_before);
        assert_eq!(harness.db.requests_handled(), 0);

        // The session survives the failed call.
        harness.broker.reject_publishes(false);
        let retried = harness
            .client
            .create(&CreateRequest { id: "x".into(), value: json!(1) })
            .await;
        assert!(retried.errors.is_empty());
    }

    #[tokio::test]
    async fn test_broker_offline_mid_session() {
        let harness = Harness::start(Duration::from_secs(2)).await;
        harness.broker.set_online(false);

        let response = harness.client.read(&ReadRequest { id: "x".into() }).await;

        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].kind, ErrorKind::Transport);
        assert!(harness.client.session().is_connected());
    }

    // =========================================================================
    // ENCODING
    // =========================================================================

    /// Request encoding failure: one encoding error, nothing published.
    #[tokio::test]
    async fn test_request_encoding_failure() {
        let harness = Harness::start(Duration::from_secs(2)).await;
        let executor = CallExecutor::new(harness.client.session().clone());
        let published_before = harness.broker.messages_published();

        let response: CreateResponse = executor.call(Operation::Create, &Unencodable).await;

        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].kind, ErrorKind::Encoding);
        assert_eq!(harness.broker.messages_published(), published_before);
        assert_eq!(harness.client.session().table().pending_count(), 0);
    }
}
