//! # Error Types
//!
//! The caller-visible error model. Every CRUD response carries a list of
//! [`ModelError`]; an empty list means success.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Description attached to every deadline failure.
pub const TIMEOUT_DESCRIPTION: &str = "Timed out waiting for DB reply";

/// Category of a [`ModelError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// Connect, subscribe or publish failed at the pub/sub layer.
    Transport,
    /// Request marshal or response unmarshal failed.
    Encoding,
    /// No reply arrived within the configured deadline.
    Timeout,
    /// The database module reported a failure in its reply.
    Database,
}

impl ErrorKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::Encoding => "encoding",
            Self::Timeout => "timeout",
            Self::Database => "database",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single typed error reported to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelError {
    /// Error category.
    pub kind: ErrorKind,
    /// Human readable description.
    pub description: String,
}

impl ModelError {
    pub fn new(kind: ErrorKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
        }
    }

    pub fn transport(description: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, description)
    }

    pub fn encoding(description: impl Into<String>) -> Self {
        Self::new(ErrorKind::Encoding, description)
    }

    /// The deadline error. Its description is always [`TIMEOUT_DESCRIPTION`].
    pub fn timeout() -> Self {
        Self::new(ErrorKind::Timeout, TIMEOUT_DESCRIPTION)
    }

    pub fn database(description: impl Into<String>) -> Self {
        Self::new(ErrorKind::Database, description)
    }
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.description)
    }
}

/// A response shape that carries an error list next to its payload.
///
/// Implemented by every CRUD response so a call can attach the errors it
/// produced to an otherwise empty (default) response.
pub trait WithErrors: Default {
    /// Errors reported for this call.
    fn errors(&self) -> &[ModelError];

    /// Mutable access used to attach call errors.
    fn errors_mut(&mut self) -> &mut Vec<ModelError>;

    /// Build an empty response that carries only `errors`.
    fn from_errors(errors: Vec<ModelError>) -> Self {
        let mut response = Self::default();
        *response.errors_mut() = errors;
        response
    }

    /// True when no error was reported.
    fn is_ok(&self) -> bool {
        self.errors().is_empty()
    }
}
