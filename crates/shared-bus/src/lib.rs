//! # Shared Bus - Topic-Addressed Publish/Subscribe
//!
//! The transport every participant uses to talk to the others: clients
//! publish requests, the database module publishes replies, and both
//! subscribe with MQTT-style topic filters.
//!
//! ```text
//! ┌──────────────┐   publish(REQ/...)   ┌──────────────┐
//! │   Client     │ ───────┐             │  DB Module   │
//! │              │        │             │              │
//! └──────────────┘        ▼             └──────────────┘
//!        ↑          ┌──────────────┐           │
//!        │          │    Broker    │ ◄─────────┘
//!        └───────── │              │  publish(RSP/...)
//!  subscribe(RSP/+) └──────────────┘
//! ```
//!
//! ## Contract
//!
//! - [`Connector::connect`] yields a [`Transport`] or `TransportError::Unreachable`.
//! - Delivery callbacks run on the connection's dispatch task and must not block.
//! - No persistence and no delivery guarantee beyond "at most once per
//!   matching subscription while connected".

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod broker;
pub mod topic;
pub mod transport;

pub use broker::{BrokerConnection, InMemoryBroker};
pub use topic::{
    filter_matches, validate_filter, validate_topic_name, MULTI_LEVEL_WILDCARD,
    SINGLE_LEVEL_WILDCARD,
};
pub use transport::{Connector, Message, MessageHandler, Transport, TransportError};
