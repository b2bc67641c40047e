//! # ORM Client
//!
//! Request/response CRUD calls over a topic-addressed publish/subscribe bus.
//!
//! ## Architecture
//!
//! ```text
//! DbClient::read(req)
//!     │
//!     ▼
//! CallExecutor ──register──► CorrelationTable ◄──complete── reply router
//!     │                                                        ▲
//!     └──publish REQ/...──► Session ══ broker ══ RSP/... ──────┘
//! ```
//!
//! Each call gets a fresh `RequestId`, is tracked in the correlation table
//! until its reply arrives or its deadline passes, and returns exactly one
//! result. Failures are reported as data in the response's `errors` list.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let broker = InMemoryBroker::new();
//! let client = DbClient::connect(ClientConfig::from_env()?, &broker).await?;
//! let response = client.read(&ReadRequest { id: "x".into() }).await;
//! if response.errors.is_empty() {
//!     println!("{}", response.value);
//! }
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapters;
pub mod client;
pub mod domain;
pub mod executor;

pub use adapters::pending::{CorrelationError, CorrelationStats, CorrelationTable, ReplyHandler};
pub use adapters::session::Session;
pub use client::DbClient;
pub use domain::*;
pub use executor::{CallExecutor, CallState};
