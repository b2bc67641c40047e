//! # Round Trips
//!
//! Calls whose reply arrives before the deadline.

#[cfg(test)]
mod tests {
    use super::super::harness::Harness;
    use orm_client::ReplyRouting;
    use serde_json::json;
    use shared_types::{
        CreateRequest, DeleteRequest, ErrorKind, ReadRequest, UpdateRequest, WithErrors,
    };
    use std::time::Duration;
    use tokio::time::Instant;

    // =========================================================================
    // DEADLINE BEHAVIOUR
    // =========================================================================

    /// Reply after 500ms under a 2s timeout: value returned, no errors,
    /// well before the deadline.
    #[tokio::test(start_paused = true)]
    async fn test_delayed_reply_within_deadline() {
        let harness = Harness::start(Duration::from_secs(2)).await;
        harness.db.store().create("x", json!(42)).unwrap();
        harness.db.set_reply_delay(Duration::from_millis(500));

        let started = Instant::now();
        let response = harness.client.read(&ReadRequest { id: "x".into() }).await;
        let elapsed = started.elapsed();

        assert!(response.errors.is_empty(), "errors: {:?}", response.errors);
        assert_eq!(response.id, "x");
        assert_eq!(response.value, json!(42));
        assert!(elapsed >= Duration::from_millis(500));
        assert!(elapsed < Duration::from_millis(600));
    }

    #[tokio::test]
    async fn test_full_crud_cycle() {
        let harness = Harness::start(Duration::from_secs(2)).await;
        let client = &harness.client;

        let created = client
            .create(&CreateRequest { id: "user-1".into(), value: json!({"name": "ada"}) })
            .await;
        assert!(created.is_ok());
        assert_eq!(created.id, "user-1");

        let read = client.read(&ReadRequest { id: "user-1".into() }).await;
        assert_eq!(read.value, json!({"name": "ada"}));

        let updated = client
            .update(&UpdateRequest { id: "user-1".into(), value: json!({"name": "grace"}) })
            .await;
        assert!(updated.is_ok());
        assert_eq!(updated.previous, json!({"name": "ada"}));

        let deleted = client.delete(&DeleteRequest { id: "user-1".into() }).await;
        assert!(deleted.deleted);
        assert!(harness.db.store().is_empty());

        assert_eq!(client.session().table().pending_count(), 0);
    }

    /// Failures the database reports in its reply reach the caller as-is.
    #[tokio::test]
    async fn test_database_error_in_reply() {
        let harness = Harness::start(Duration::from_secs(2)).await;

        let read = harness.client.read(&ReadRequest { id: "ghost".into() }).await;

        assert_eq!(read.errors.len(), 1);
        assert_eq!(read.errors[0].kind, ErrorKind::Database);
        assert!(read.errors[0].description.contains("ghost"));
    }

    // =========================================================================
    // PER-CALL ROUTING
    // =========================================================================

    #[tokio::test]
    async fn test_per_call_routing_round_trip() {
        let harness = Harness::with_routing(ReplyRouting::PerCall, Duration::from_secs(2)).await;
        harness.db.store().create("x", json!("per-call")).unwrap();

        // Only the database module's request subscription exists between calls.
        assert_eq!(harness.broker.subscription_count(), 1);

        let response = harness.client.read(&ReadRequest { id: "x".into() }).await;

        assert!(response.is_ok());
        assert_eq!(response.value, json!("per-call"));
        assert_eq!(harness.broker.subscription_count(), 1);
    }

    #[tokio::test]
    async fn test_shared_routing_keeps_single_reply_subscription() {
        let harness = Harness::start(Duration::from_secs(2)).await;

        for i in 0..5 {
            let id = format!("r-{}", i);
            let created = harness
                .client
                .create(&CreateRequest { id, value: json!(i) })
                .await;
            assert!(created.is_ok());
        }

        // Database request filter + one wildcard reply filter.
        assert_eq!(harness.broker.subscription_count(), 2);
        assert!(harness.broker.has_subscription("RSP/DB/db-test/BACKEND/backend-0/+"));
    }
}
