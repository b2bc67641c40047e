//! # CRUD Payloads
//!
//! Request and response bodies exchanged with the database module. Records
//! are addressed by `id` and hold an arbitrary JSON `value`.
//!
//! Response bodies default every field so a partial reply from the database
//! still decodes; `errors` is omitted from the wire when empty.

use crate::errors::{ModelError, WithErrors};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// REQUESTS
// =============================================================================

/// Insert a new record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateRequest {
    pub id: String,
    pub value: Value,
}

/// Fetch a record by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadRequest {
    pub id: String,
}

/// Replace the value of an existing record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateRequest {
    pub id: String,
    pub value: Value,
}

/// Remove a record by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub id: String,
}

// =============================================================================
// RESPONSES
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateResponse {
    /// Id of the created record.
    pub id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ModelError>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadResponse {
    pub id: String,
    /// Stored value; `null` when the call failed.
    pub value: Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ModelError>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateResponse {
    pub id: String,
    /// Value stored before the update.
    pub previous: Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ModelError>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeleteResponse {
    pub id: String,
    /// Whether a record was removed.
    pub deleted: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ModelError>,
}

macro_rules! impl_with_errors {
    ($($ty:ty),* $(,)?) => {
        $(
            impl WithErrors for $ty {
                fn errors(&self) -> &[ModelError] {
                    &self.errors
                }

                fn errors_mut(&mut self) -> &mut Vec<ModelError> {
                    &mut self.errors
                }
            }
        )*
    };
}

impl_with_errors!(CreateResponse, ReadResponse, UpdateResponse, DeleteResponse);
