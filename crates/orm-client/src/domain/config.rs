//! Client configuration with validation.

use serde::{Deserialize, Serialize};
use shared_types::{Identity, ModuleKind};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// How replies reach the waiting call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyRouting {
    /// One long-lived wildcard subscription per session routes every reply
    /// through the correlation table.
    #[default]
    Shared,
    /// Each call subscribes to its own response topic for its lifetime.
    PerCall,
}

impl ReplyRouting {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Shared => "shared",
            Self::PerCall => "per_call",
        }
    }
}

impl fmt::Display for ReplyRouting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReplyRouting {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "shared" | "wildcard" => Ok(Self::Shared),
            "per_call" | "exact" => Ok(Self::PerCall),
            other => Err(ConfigError::Invalid(format!("unknown reply routing: {}", other))),
        }
    }
}

/// Client session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Broker address to connect to
    pub broker_addr: String,
    /// Instance id of the database module
    pub db_id: String,
    /// Module kind this client announces as sender
    pub sender_module: ModuleKind,
    /// Instance id of this client
    pub sender_id: String,
    /// Deadline for a single call
    pub request_timeout_ms: u64,
    /// Extra time added to the timeout between correlation table sweeps
    pub cleanup_grace_ms: u64,
    /// Reply delivery path
    pub reply_routing: ReplyRouting,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            broker_addr: "memory://local".to_string(),
            db_id: "db-0".to_string(),
            sender_module: ModuleKind::Backend,
            sender_id: "backend-0".to_string(),
            request_timeout_ms: 5_000,
            cleanup_grace_ms: 60_000,
            reply_routing: ReplyRouting::Shared,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables over the defaults.
    ///
    /// # Environment Variables
    ///
    /// - `ORM_BROKER_ADDR`: Broker address (default: memory://local)
    /// - `ORM_DB_ID`: Database module instance id (default: db-0)
    /// - `ORM_SENDER_MODULE`: Sender module kind (default: BACKEND)
    /// - `ORM_SENDER_ID`: Sender instance id (default: backend-0)
    /// - `ORM_REQUEST_TIMEOUT_MS`: Call deadline (default: 5000)
    /// - `ORM_CLEANUP_GRACE_MS`: Sweep grace period (default: 60000)
    /// - `ORM_REPLY_ROUTING`: `shared` or `per_call` (default: shared)
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(addr) = env::var("ORM_BROKER_ADDR") {
            config.broker_addr = addr;
        }
        if let Ok(db_id) = env::var("ORM_DB_ID") {
            config.db_id = db_id;
        }
        if let Ok(module) = env::var("ORM_SENDER_MODULE") {
            config.sender_module = ModuleKind::from(module);
        }
        if let Ok(sender_id) = env::var("ORM_SENDER_ID") {
            config.sender_id = sender_id;
        }
        if let Ok(ms) = env::var("ORM_REQUEST_TIMEOUT_MS") {
            config.request_timeout_ms = parse_millis("ORM_REQUEST_TIMEOUT_MS", &ms)?;
        }
        if let Ok(ms) = env::var("ORM_CLEANUP_GRACE_MS") {
            config.cleanup_grace_ms = parse_millis("ORM_CLEANUP_GRACE_MS", &ms)?;
        }
        if let Ok(routing) = env::var("ORM_REPLY_ROUTING") {
            config.reply_routing = routing.parse()?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.broker_addr.trim().is_empty() {
            return Err(ConfigError::Invalid("broker_addr cannot be empty".into()));
        }

        for (name, value) in [
            ("db_id", self.db_id.as_str()),
            ("sender_module", self.sender_module.as_str()),
            ("sender_id", self.sender_id.as_str()),
        ] {
            if value.is_empty() {
                return Err(ConfigError::InvalidTopicLevel(format!("{} cannot be empty", name)));
            }
            if value.contains(['/', '+', '#']) {
                return Err(ConfigError::InvalidTopicLevel(format!(
                    "{} '{}' contains a topic separator or wildcard",
                    name, value
                )));
            }
        }

        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout(
                "request_timeout_ms cannot be 0".into(),
            ));
        }

        Ok(())
    }

    /// Identity this configuration connects as.
    pub fn identity(&self) -> Identity {
        Identity::new(
            self.broker_addr.clone(),
            self.db_id.clone(),
            self.sender_module.clone(),
            self.sender_id.clone(),
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn cleanup_grace(&self) -> Duration {
        Duration::from_millis(self.cleanup_grace_ms)
    }

    /// Interval between correlation table sweeps: timeout plus grace.
    pub fn cleanup_interval(&self) -> Duration {
        self.request_timeout() + self.cleanup_grace()
    }
}

fn parse_millis(var: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{} is not a number of milliseconds: {}", var, value)))
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A value used as a topic level is unusable
    #[error("invalid topic level: {0}")]
    InvalidTopicLevel(String),
    /// Invalid timeout value
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
    /// General configuration error
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
