//! # Concurrent Calls
//!
//! Many outstanding calls share one session; each sees only its own reply.

#[cfg(test)]
mod tests {
    use super::super::harness::Harness;
    use futures::future::join_all;
    use orm_telemetry::{encode_metrics, register_metrics};
    use serde_json::json;
    use shared_types::{CreateRequest, ReadRequest, WithErrors};
    use std::time::Duration;

    #[tokio::test]
    async fn test_two_concurrent_creates_get_own_replies() {
        let harness = Harness::start(Duration::from_secs(2)).await;
        let client = &harness.client;

        let first = CreateRequest { id: "first".into(), value: json!(1) };
        let second = CreateRequest { id: "second".into(), value: json!(2) };
        let (a, b) = tokio::join!(client.create(&first), client.create(&second));

        assert!(a.is_ok());
        assert!(b.is_ok());
        assert_eq!(a.id, "first");
        assert_eq!(b.id, "second");
        assert_eq!(harness.db.store().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_many_outstanding_reads() {
        let harness = Harness::start(Duration::from_secs(5)).await;
        for i in 0..50 {
            harness.db.store().create(&format!("k{}", i), json!(i)).unwrap();
        }
        harness.db.set_reply_delay(Duration::from_millis(20));

        let requests: Vec<ReadRequest> = (0..50).map(|i| ReadRequest { id: format!("k{}", i) }).collect();
        let responses = join_all(requests.iter().map(|r| harness.client.read(r))).await;

        for (i, response) in responses.iter().enumerate() {
            assert!(response.is_ok(), "call {} failed: {:?}", i, response.errors);
            assert_eq!(response.id, format!("k{}", i));
            assert_eq!(response.value, json!(i));
        }
        assert_eq!(harness.client.session().table().pending_count(), 0);
    }

    /// Two clients on one broker never receive each other's replies.
    #[tokio::test]
    async fn test_clients_are_isolated() {
        let harness = Harness::start(Duration::from_secs(2)).await;
        let other = harness.client("backend-1").await;

        let mine = CreateRequest { id: "mine".into(), value: json!("a") };
        let theirs = CreateRequest { id: "theirs".into(), value: json!("b") };
        let (a, b) = tokio::join!(harness.client.create(&mine), other.create(&theirs));

        assert_eq!(a.id, "mine");
        assert_eq!(b.id, "theirs");

        let stats_a = harness.client.session().table().stats();
        let stats_b = other.session().table().stats();
        assert_eq!(stats_a.total_unmatched.load(std::sync::atomic::Ordering::Relaxed), 0);
        assert_eq!(stats_b.total_unmatched.load(std::sync::atomic::Ordering::Relaxed), 0);

        let read = other.read(&ReadRequest { id: "mine".into() }).await;
        assert_eq!(read.value, json!("a"));
    }

    #[tokio::test]
    async fn test_calls_are_counted_in_metrics() {
        register_metrics().unwrap();
        let harness = Harness::start(Duration::from_secs(2)).await;

        let created = harness
            .client
            .create(&CreateRequest { id: "m".into(), value: json!(0) })
            .await;
        assert!(created.is_ok());

        let text = encode_metrics().unwrap();
        assert!(text.contains("orm_client_calls_total"));
        assert!(text.contains("orm_db_requests_total"));
    }
}
