//! # Client Identity
//!
//! How a client is addressed as the target of replies.

use crate::module::ModuleKind;
use serde::{Deserialize, Serialize};

/// Identity of a client session on the bus.
///
/// Immutable once a session is established: the long-lived reply
/// subscription is derived from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Address of the broker the session connects to.
    pub broker_addr: String,
    /// Instance id of the database module requests are sent to.
    pub db_id: String,
    /// Module kind of this client.
    pub sender_module: ModuleKind,
    /// Instance id of this client.
    pub sender_id: String,
}

impl Identity {
    pub fn new(
        broker_addr: impl Into<String>,
        db_id: impl Into<String>,
        sender_module: ModuleKind,
        sender_id: impl Into<String>,
    ) -> Self {
        Self {
            broker_addr: broker_addr.into(),
            db_id: db_id.into(),
            sender_module,
            sender_id: sender_id.into(),
        }
    }
}
