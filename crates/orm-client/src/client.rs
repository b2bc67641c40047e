//! Operation Façade - typed CRUD calls against the database module.

use crate::adapters::session::Session;
use crate::domain::config::ClientConfig;
use crate::domain::error::OrmResult;
use crate::executor::CallExecutor;
use shared_bus::Connector;
use shared_types::{
    CreateRequest, CreateResponse, DeleteRequest, DeleteResponse, Operation, ReadRequest,
    ReadResponse, UpdateRequest, UpdateResponse,
};
use std::sync::Arc;

/// CRUD client bound to one database module.
///
/// Cheap to clone; clones share the session. Every method returns the
/// response with its `errors` list filled in: empty on success, otherwise
/// exactly one transport, encoding or timeout error, or the errors the
/// database reported.
///
/// Errors of kind `database` arrive inside a decoded reply, so they may
/// come with a partially populated payload (for example `id` set and
/// `value` null). Check `errors` before trusting the other fields.
#[derive(Debug, Clone)]
pub struct DbClient {
    executor: CallExecutor,
}

impl DbClient {
    /// Open a session and wrap it.
    pub async fn connect(config: ClientConfig, connector: &dyn Connector) -> OrmResult<Self> {
        let session = Session::connect(config, connector).await?;
        Ok(Self::new(session))
    }

    pub fn new(session: Arc<Session>) -> Self {
        Self {
            executor: CallExecutor::new(session),
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        self.executor.session()
    }

    pub async fn create(&self, request: &CreateRequest) -> CreateResponse {
        self.executor.call(Operation::Create, request).await
    }

    pub async fn read(&self, request: &ReadRequest) -> ReadResponse {
        self.executor.call(Operation::Read, request).await
    }

    pub async fn update(&self, request: &UpdateRequest) -> UpdateResponse {
        self.executor.call(Operation::Update, request).await
    }

    pub async fn delete(&self, request: &DeleteRequest) -> DeleteResponse {
        self.executor.call(Operation::Delete, request).await
    }

    /// Close the underlying session.
    pub async fn disconnect(&self) {
        self.session().disconnect().await;
    }
}
