//! # ORM Node
//!
//! Runs an in-process broker, a database module and a client, then drives a
//! create/read/update/delete sequence through the bus and prints the
//! resulting metrics.
//!
//! ## Startup Sequence
//!
//! 1. Initialize telemetry (logging + metrics)
//! 2. Load client and database module configuration from the environment
//! 3. Start the broker and the database module
//! 4. Connect the client and run the CRUD sequence
//! 5. Disconnect, stop the database module, dump metrics

use anyhow::{bail, Context, Result};
use orm_client::{ClientConfig, DbClient};
use orm_runtime::{DbModuleConfig, MemoryDatabase};
use orm_telemetry::{encode_metrics, init_telemetry, TelemetryConfig};
use serde_json::json;
use shared_bus::InMemoryBroker;
use shared_types::{CreateRequest, DeleteRequest, ReadRequest, UpdateRequest, WithErrors};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let _telemetry = init_telemetry(TelemetryConfig::for_component("node"))
        .context("failed to initialize telemetry")?;

    let client_config = ClientConfig::from_env().context("invalid client configuration")?;
    let mut db_config = DbModuleConfig::from_env();
    db_config.broker_addr = client_config.broker_addr.clone();
    db_config.db_id = client_config.db_id.clone();

    let broker = InMemoryBroker::with_address(client_config.broker_addr.clone());
    let database = MemoryDatabase::start(db_config, &broker)
        .await
        .context("failed to start database module")?;
    let client = DbClient::connect(client_config, &broker)
        .await
        .context("failed to connect client")?;

    let outcome = run_sequence(&client).await;

    client.disconnect().await;
    database.stop().await;

    match encode_metrics() {
        Ok(metrics) => println!("{}", metrics),
        Err(e) => error!(error = %e, "Failed to encode metrics"),
    }

    outcome
}

async fn run_sequence(client: &DbClient) -> Result<()> {
    let id = "greeting".to_string();

    let created = client
        .create(&CreateRequest {
            id: id.clone(),
            value: json!({ "text": "hello" }),
        })
        .await;
    report("create", &created)?;

    let read = client.read(&ReadRequest { id: id.clone() }).await;
    report("read", &read)?;
    info!(id = %read.id, value = %read.value, "Read record");

    let updated = client
        .update(&UpdateRequest {
            id: id.clone(),
            value: json!({ "text": "hello again" }),
        })
        .await;
    report("update", &updated)?;
    info!(id = %updated.id, previous = %updated.previous, "Updated record");

    let deleted = client.delete(&DeleteRequest { id }).await;
    report("delete", &deleted)?;
    info!(id = %deleted.id, deleted = deleted.deleted, "Deleted record");

    Ok(())
}

fn report<R: WithErrors>(operation: &str, response: &R) -> Result<()> {
    let Some(first) = response.errors().first() else {
        return Ok(());
    };
    for e in response.errors() {
        error!(operation = operation, kind = %e.kind, description = %e.description, "Call failed");
    }
    bail!("{} failed: {}", operation, first)
}
