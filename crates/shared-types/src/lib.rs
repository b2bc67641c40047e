//! # Shared Types Crate
//!
//! Types shared by every participant on the bus: the client, the database
//! module and the broker adapters.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: module kinds, operations and the CRUD payload
//!   shapes are defined once here.
//! - **Errors Are Data**: a call reports failures as a list of [`ModelError`]
//!   attached to its response, never by panicking or by an out-of-band channel.

pub mod errors;
pub mod identity;
pub mod module;
pub mod payloads;

pub use errors::*;
pub use identity::Identity;
pub use module::{ModuleKind, Operation, UnknownOperation};
pub use payloads::*;
