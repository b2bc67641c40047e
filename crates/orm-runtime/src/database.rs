//! # Database Module
//!
//! Answers CRUD requests addressed to `DB/{db_id}` with replies on the
//! matching response topic. Each request is served on its own task so the
//! broker's dispatch loop never waits on the store or on a reply delay.

use crate::store::RecordStore;
use bytes::Bytes;
use orm_client::domain::topics::{incoming_request_filter, RequestTopic};
use orm_telemetry::metrics::DB_REQUESTS;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use shared_bus::{Connector, Message, MessageHandler, Transport, TransportError};
use shared_types::{
    CreateRequest, CreateResponse, DeleteRequest, DeleteResponse, ModelError, ModuleKind,
    Operation, ReadRequest, ReadResponse, UpdateRequest, UpdateResponse, WithErrors,
};
use std::env;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Database module configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbModuleConfig {
    /// Broker address to connect to
    pub broker_addr: String,
    /// Instance id requests are addressed to
    pub db_id: String,
    /// Artificial delay before each reply
    pub reply_delay_ms: u64,
}

impl Default for DbModuleConfig {
    fn default() -> Self {
        Self {
            broker_addr: "memory://local".to_string(),
            db_id: "db-0".to_string(),
            reply_delay_ms: 0,
        }
    }
}

impl DbModuleConfig {
    /// Load from `ORM_BROKER_ADDR`, `ORM_DB_ID` and `ORM_DB_REPLY_DELAY_MS`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            broker_addr: env::var("ORM_BROKER_ADDR").unwrap_or(defaults.broker_addr),
            db_id: env::var("ORM_DB_ID").unwrap_or(defaults.db_id),
            reply_delay_ms: env::var("ORM_DB_REPLY_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.reply_delay_ms),
        }
    }
}

/// State shared with the request tasks
#[derive(Debug, Default)]
struct DbState {
    store: RecordStore,
    silent: AtomicBool,
    reply_delay_ms: AtomicU64,
    requests_handled: AtomicU64,
}

/// In-memory database module attached to the bus.
pub struct MemoryDatabase {
    config: DbModuleConfig,
    transport: Arc<dyn Transport>,
    state: Arc<DbState>,
    filter: String,
}

impl MemoryDatabase {
    /// Connect and start serving requests.
    pub async fn start(
        config: DbModuleConfig,
        connector: &dyn Connector,
    ) -> Result<Self, TransportError> {
        let transport = connector.connect(&config.broker_addr).await?;
        let state = Arc::new(DbState::default());
        state
            .reply_delay_ms
            .store(config.reply_delay_ms, Ordering::Relaxed);

        let filter = incoming_request_filter(&ModuleKind::Db, &config.db_id);
        let handler = request_handler(Arc::downgrade(&transport), state.clone());
        transport.subscribe(&filter, handler).await?;

        info!(db_id = %config.db_id, filter = %filter, "Database module started");

        Ok(Self {
            config,
            transport,
            state,
            filter,
        })
    }

    pub fn db_id(&self) -> &str {
        &self.config.db_id
    }

    pub fn store(&self) -> &RecordStore {
        &self.state.store
    }

    /// Keep consuming requests but stop replying.
    pub fn set_silent(&self, silent: bool) {
        self.state.silent.store(silent, Ordering::Relaxed);
    }

    pub fn set_reply_delay(&self, delay: Duration) {
        self.state
            .reply_delay_ms
            .store(delay.as_millis() as u64, Ordering::Relaxed);
    }

    /// Requests received, whether or not they were answered.
    pub fn requests_handled(&self) -> u64 {
        self.state.requests_handled.load(Ordering::Relaxed)
    }

    pub async fn stop(&self) {
        if let Err(e) = self.transport.unsubscribe(&self.filter).await {
            debug!(error = %e, "Request unsubscribe failed");
        }
        self.transport.disconnect().await;
        info!(db_id = %self.config.db_id, "Database module stopped");
    }
}

/// Subscription callback. Holds the transport weakly so the subscription
/// does not keep its own connection alive.
fn request_handler(transport: Weak<dyn Transport>, state: Arc<DbState>) -> MessageHandler {
    Arc::new(move |message: Message| {
        let Some(transport) = transport.upgrade() else {
            return;
        };
        let state = state.clone();
        tokio::spawn(serve(transport, state, message));
    })
}

async fn serve(transport: Arc<dyn Transport>, state: Arc<DbState>, message: Message) {
    let request = match RequestTopic::parse(&message.topic) {
        Ok(request) => request,
        Err(e) => {
            warn!(topic = %message.topic, error = %e, "Ignoring request on malformed topic");
            return;
        }
    };
    state.requests_handled.fetch_add(1, Ordering::Relaxed);

    if state.silent.load(Ordering::Relaxed) {
        debug!(request_id = %request.request_id, "Silent mode, request dropped");
        return;
    }

    let reply = match handle_request(&state.store, request.operation, &message.payload) {
        Ok(reply) => reply,
        Err(e) => {
            warn!(request_id = %request.request_id, error = %e, "Failed to encode reply");
            return;
        }
    };

    let delay = state.reply_delay_ms.load(Ordering::Relaxed);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    let topic = request.to_response().to_string();
    match transport.publish(&topic, reply).await {
        Ok(()) => debug!(
            request_id = %request.request_id,
            operation = %request.operation,
            "Reply published"
        ),
        Err(e) => warn!(request_id = %request.request_id, error = %e, "Failed to publish reply"),
    }
}

/// Apply one request body to `store` and encode the reply body.
///
/// Undecodable requests are answered with a single `encoding` error and
/// store failures with a single `database` error.
pub fn handle_request(
    store: &RecordStore,
    operation: Operation,
    body: &[u8],
) -> Result<Bytes, serde_json::Error> {
    match operation {
        Operation::Create => {
            let response = match decode::<CreateRequest>(body) {
                Ok(request) => match store.create(&request.id, request.value) {
                    Ok(()) => CreateResponse {
                        id: request.id,
                        errors: Vec::new(),
                    },
                    Err(e) => CreateResponse {
                        id: request.id,
                        errors: vec![ModelError::database(e.to_string())],
                    },
                },
                Err(e) => CreateResponse::from_errors(vec![e]),
            };
            finish(operation, &response)
        }
        Operation::Read => {
            let response = match decode::<ReadRequest>(body) {
                Ok(request) => match store.read(&request.id) {
                    Ok(value) => ReadResponse {
                        id: request.id,
                        value,
                        errors: Vec::new(),
                    },
                    Err(e) => ReadResponse {
                        id: request.id,
                        errors: vec![ModelError::database(e.to_string())],
                        ..Default::default()
                    },
                },
                Err(e) => ReadResponse::from_errors(vec![e]),
            };
            finish(operation, &response)
        }
        Operation::Update => {
            let response = match decode::<UpdateRequest>(body) {
                Ok(request) => match store.update(&request.id, request.value) {
                    Ok(previous) => UpdateResponse {
                        id: request.id,
                        previous,
                        errors: Vec::new(),
                    },
                    Err(e) => UpdateResponse {
                        id: request.id,
                        errors: vec![ModelError::database(e.to_string())],
                        ..Default::default()
                    },
                },
                Err(e) => UpdateResponse::from_errors(vec![e]),
            };
            finish(operation, &response)
        }
        Operation::Delete => {
            let response = match decode::<DeleteRequest>(body) {
                Ok(request) => DeleteResponse {
                    deleted: store.delete(&request.id),
                    id: request.id,
                    errors: Vec::new(),
                },
                Err(e) => DeleteResponse::from_errors(vec![e]),
            };
            finish(operation, &response)
        }
    }
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, ModelError> {
    serde_json::from_slice(body).map_err(|e| ModelError::encoding(e.to_string()))
}

fn finish<R: Serialize + WithErrors>(
    operation: Operation,
    response: &R,
) -> Result<Bytes, serde_json::Error> {
    let status = if response.is_ok() { "ok" } else { "error" };
    DB_REQUESTS
        .with_label_values(&[operation.as_str(), status])
        .inc();
    serde_json::to_vec(response).map(Bytes::from)
}
