//! Async infrastructure: the correlation table and the broker session.

pub mod pending;
pub mod session;
