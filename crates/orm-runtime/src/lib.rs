//! # ORM Runtime
//!
//! The database side of the bus: an in-memory record store answering the
//! CRUD requests `orm-client` publishes.
//!
//! ```text
//! REQ/{sender}/{sender_id}/DB/{db_id}/{request_id}/{op}
//!         │
//!         ▼
//!   MemoryDatabase ──► RecordStore
//!         │
//!         ▼
//! RSP/DB/{db_id}/{sender}/{sender_id}/{request_id}
//! ```

pub mod database;
pub mod store;

pub use database::{handle_request, DbModuleConfig, MemoryDatabase};
pub use store::{RecordStore, StoreError};
