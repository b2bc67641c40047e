//! # Integration Scenarios
//!
//! Every scenario talks through the broker only: the client never touches
//! the database module's store except to seed it.

pub mod harness;

mod concurrency;
mod failures;
mod round_trip;

pub use harness::Harness;
