//! # Topic-ORM Test Suite
//!
//! End-to-end scenarios running the client against the in-memory broker and
//! the database module.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── harness.rs      # Broker + database module + client fixture
//!     ├── round_trip.rs   # Replies within the deadline
//!     ├── failures.rs     # Timeout, transport and encoding failures
//!     └── concurrency.rs  # Many outstanding calls on one session
//! tests/benches/
//! └── bridge_benchmarks.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p orm-tests
//! cargo test -p orm-tests integration::failures::
//! cargo bench -p orm-tests
//! ```

#![allow(dead_code)]

pub mod integration;
