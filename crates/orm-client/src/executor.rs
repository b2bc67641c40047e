//! Call Executor - one request/response exchange.
//!
//! ```text
//! Building ──► AwaitingReply ──► Completed
//!    │               │
//!    │               └─────────► TimedOut
//!    └── encode / register / subscribe / publish failure ──► error result
//! ```
//!
//! The reply handler registered in the correlation table forwards into a
//! private `oneshot` channel. The wait is a `tokio::time::timeout` race on
//! that channel. Whatever way the call ends, including the caller dropping
//! the future, the [`CallGuard`] removes the correlation entry and releases
//! any per-call subscription.

use crate::adapters::session::Session;
use crate::domain::config::ReplyRouting;
use crate::domain::correlation::RequestId;
use crate::domain::error::{OrmError, OrmResult};
use crate::domain::topics::{request_topic, RequestTopic, ResponseTopic};
use bytes::Bytes;
use orm_telemetry::metrics::{CALLS_TOTAL, CALL_DURATION};
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared_types::{ModelError, Operation, WithErrors};
use std::fmt;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// Lifecycle of a single call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    /// Generating the request id, topics and request body.
    Building,
    /// Registered and published, waiting for the reply or the deadline.
    AwaitingReply,
    /// A reply arrived and was decoded.
    Completed,
    /// The deadline elapsed first.
    TimedOut,
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Building => "building",
            Self::AwaitingReply => "awaiting_reply",
            Self::Completed => "completed",
            Self::TimedOut => "timed_out",
        };
        f.write_str(name)
    }
}

/// Runs calls over a shared [`Session`].
#[derive(Debug, Clone)]
pub struct CallExecutor {
    session: Arc<Session>,
}

impl CallExecutor {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Run one call and attach any failure to an otherwise empty response.
    ///
    /// Exactly one of these is returned: the decoded reply (carrying only the
    /// errors the database itself reported), one `timeout` error, or one
    /// `transport`/`encoding` error.
    pub async fn call<Req, Rsp>(&self, operation: Operation, request: &Req) -> Rsp
    where
        Req: Serialize + ?Sized,
        Rsp: DeserializeOwned + WithErrors,
    {
        match self.execute(operation, request).await {
            Ok(response) => response,
            Err(e) => Rsp::from_errors(vec![ModelError::from(e)]),
        }
    }

    /// Run one call and return the decoded reply or the error that ended it.
    pub async fn execute<Req, Rsp>(&self, operation: Operation, request: &Req) -> OrmResult<Rsp>
    where
        Req: Serialize + ?Sized,
        Rsp: DeserializeOwned,
    {
        let started = Instant::now();
        let result = self.run(operation, request).await;

        let outcome = match &result {
            Ok(_) => "completed",
            Err(e) => e.outcome(),
        };
        CALLS_TOTAL
            .with_label_values(&[operation.as_str(), outcome])
            .inc();
        CALL_DURATION
            .with_label_values(&[operation.as_str()])
            .observe(started.elapsed().as_secs_f64());

        result
    }

    async fn run<Req, Rsp>(&self, operation: Operation, request: &Req) -> OrmResult<Rsp>
    where
        Req: Serialize + ?Sized,
        Rsp: DeserializeOwned,
    {
        // Building
        let mut state = CallState::Building;
        let request_id = RequestId::new();
        let request_topic = request_topic(self.session.identity(), request_id, operation);
        let payload = serde_json::to_vec(request).map_err(|e| {
            warn!(request_id = %request_id, operation = %operation, error = %e, "Request encoding failed");
            OrmError::EncodeRequest(e)
        })?;

        // AwaitingReply
        let (tx, rx) = oneshot::channel::<Bytes>();
        self.session.table().register(
            request_id,
            Box::new(move |reply| {
                // The caller may already have given up.
                let _ = tx.send(reply);
            }),
            Some(self.session.request_timeout()),
        )?;
        let mut guard = CallGuard::new(self.session.clone(), request_id);

        let result = self
            .await_reply(&mut guard, &mut state, &request_topic, Bytes::from(payload), rx)
            .await;

        guard.release().await;

        match &result {
            Ok(_) => debug!(request_id = %request_id, operation = %operation, "Call completed"),
            Err(e) => warn!(
                request_id = %request_id,
                operation = %operation,
                state = %state,
                error = %e,
                "Call failed"
            ),
        }
        result
    }

    async fn await_reply<Rsp>(
        &self,
        guard: &mut CallGuard,
        state: &mut CallState,
        request_topic: &RequestTopic,
        payload: Bytes,
        rx: oneshot::Receiver<Bytes>,
    ) -> OrmResult<Rsp>
    where
        Rsp: DeserializeOwned,
    {
        let request_id = request_topic.request_id;

        if self.session.reply_routing() == ReplyRouting::PerCall {
            let response_topic = request_topic.to_response();
            self.session.subscribe_exact(&response_topic).await?;
            guard.exact = Some(response_topic);
        }
        self.session.publish(request_topic, payload).await?;
        transition(state, CallState::AwaitingReply, request_id);

        match tokio::time::timeout(self.session.request_timeout(), rx).await {
            Ok(Ok(reply)) => {
                transition(state, CallState::Completed, request_id);
                serde_json::from_slice(&reply).map_err(OrmError::DecodeResponse)
            }
            // Handler dropped unfired: the entry expired or was swept.
            Ok(Err(_)) | Err(_) => {
                transition(state, CallState::TimedOut, request_id);
                Err(OrmError::Timeout)
            }
        }
    }
}

fn transition(state: &mut CallState, next: CallState, request_id: RequestId) {
    trace!(request_id = %request_id, from = %state, to = %next, "Call state");
    *state = next;
}

/// Releases what a call holds on every exit path.
///
/// [`CallGuard::release`] does it in order on normal completion; `Drop`
/// covers a cancelled caller, spawning the unsubscribe onto the runtime.
struct CallGuard {
    session: Arc<Session>,
    request_id: RequestId,
    exact: Option<ResponseTopic>,
}

impl CallGuard {
    fn new(session: Arc<Session>, request_id: RequestId) -> Self {
        Self {
            session,
            request_id,
            exact: None,
        }
    }

    async fn release(mut self) {
        self.session.table().cancel(&self.request_id);
        if let Some(topic) = self.exact.take() {
            self.session.unsubscribe(&topic).await;
        }
    }
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        self.session.table().cancel(&self.request_id);

        if let Some(topic) = self.exact.take() {
            let session = self.session.clone();
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move {
                        session.unsubscribe(&topic).await;
                    });
                }
                Err(_) => warn!(topic = %topic, "No runtime to release reply subscription"),
            }
        }
    }
}
