//! Test fixture: one broker, one database module, one client.

use orm_client::{ClientConfig, DbClient, ReplyRouting};
use orm_runtime::{DbModuleConfig, MemoryDatabase};
use shared_bus::InMemoryBroker;
use shared_types::ModuleKind;
use std::time::Duration;

pub const DB_ID: &str = "db-test";

/// Broker, database module and a connected client.
pub struct Harness {
    pub broker: InMemoryBroker,
    pub db: MemoryDatabase,
    pub client: DbClient,
    routing: ReplyRouting,
    timeout: Duration,
}

impl Harness {
    /// Start with shared reply routing.
    pub async fn start(timeout: Duration) -> Self {
        Self::with_routing(ReplyRouting::Shared, timeout).await
    }

    pub async fn with_routing(routing: ReplyRouting, timeout: Duration) -> Self {
        let broker = InMemoryBroker::new();
        let db = MemoryDatabase::start(
            DbModuleConfig {
                broker_addr: broker.address().to_string(),
                db_id: DB_ID.to_string(),
                reply_delay_ms: 0,
            },
            &broker,
        )
        .await
        .expect("database module starts");

        let client = connect(&broker, "backend-0", routing, timeout).await;

        Self {
            broker,
            db,
            client,
            routing,
            timeout,
        }
    }

    /// Another client on the same broker with its own sender id.
    pub async fn client(&self, sender_id: &str) -> DbClient {
        connect(&self.broker, sender_id, self.routing, self.timeout).await
    }
}

/// Client configuration pointing at the harness database module.
pub fn client_config(sender_id: &str, routing: ReplyRouting, timeout: Duration) -> ClientConfig {
    ClientConfig {
        db_id: DB_ID.to_string(),
        sender_module: ModuleKind::Backend,
        sender_id: sender_id.to_string(),
        request_timeout_ms: timeout.as_millis() as u64,
        reply_routing: routing,
        ..Default::default()
    }
}

async fn connect(
    broker: &InMemoryBroker,
    sender_id: &str,
    routing: ReplyRouting,
    timeout: Duration,
) -> DbClient {
    DbClient::connect(client_config(sender_id, routing, timeout), broker)
        .await
        .expect("client connects")
}
