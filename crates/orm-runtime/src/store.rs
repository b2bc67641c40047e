//! Record store backing the database module.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use thiserror::Error;

/// Errors reported back to the caller inside the reply body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("record {0} already exists")]
    AlreadyExists(String),

    #[error("record {0} not found")]
    NotFound(String),

    #[error("record id cannot be empty")]
    EmptyId,
}

/// Concurrent map of record id to JSON value.
#[derive(Debug, Default)]
pub struct RecordStore {
    records: DashMap<String, Value>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new record. Existing ids are rejected.
    pub fn create(&self, id: &str, value: Value) -> Result<(), StoreError> {
        check_id(id)?;
        match self.records.entry(id.to_string()) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists(id.to_string())),
            Entry::Vacant(vacant) => {
                vacant.insert(value);
                Ok(())
            }
        }
    }

    pub fn read(&self, id: &str) -> Result<Value, StoreError> {
        self.records
            .get(id)
            .map(|value| value.clone())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Replace the value of an existing record, returning the previous one.
    pub fn update(&self, id: &str, value: Value) -> Result<Value, StoreError> {
        match self.records.get_mut(id) {
            Some(mut current) => Ok(std::mem::replace(current.value_mut(), value)),
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }

    /// Remove a record. Returns whether one was present.
    pub fn delete(&self, id: &str) -> bool {
        self.records.remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn check_id(id: &str) -> Result<(), StoreError> {
    if id.is_empty() {
        Err(StoreError::EmptyId)
    } else {
        Ok(())
    }
}
