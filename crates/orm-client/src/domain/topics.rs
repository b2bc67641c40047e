//! Topic addressing.
//!
//! Pure functions mapping a call's identity to the topic its request is
//! published on and the topic its reply comes back on.
//!
//! ```text
//! REQ/{sender_module}/{sender_id}/{receiver_module}/{receiver_id}/{request_id}/{operation}
//! RSP/{sender_module}/{sender_id}/{receiver_module}/{receiver_id}/{request_id}
//! ```
//!
//! In a reply the database module is the sender, so a response topic is the
//! request topic with both parties swapped and the operation dropped.
//! Construction does not validate ids; they must not contain `/`, `+` or `#`.

use crate::domain::correlation::RequestId;
use shared_bus::SINGLE_LEVEL_WILDCARD;
use shared_types::{Identity, ModuleKind, Operation};
use std::fmt;
use thiserror::Error;

/// First level of every request topic.
pub const REQUEST_PREFIX: &str = "REQ";
/// First level of every response topic.
pub const RESPONSE_PREFIX: &str = "RSP";

const REQUEST_LEVELS: usize = 7;
const RESPONSE_LEVELS: usize = 6;

/// Errors parsing a concrete topic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopicError {
    #[error("topic {topic} has {found} levels, expected {expected}")]
    LevelCount {
        topic: String,
        found: usize,
        expected: usize,
    },

    #[error("topic {topic} does not start with {expected}")]
    Prefix { topic: String, expected: &'static str },

    #[error("topic {topic} has an empty level")]
    EmptyLevel { topic: String },

    #[error("invalid request id {0}")]
    RequestId(String),

    #[error(transparent)]
    Operation(#[from] shared_types::UnknownOperation),
}

/// Destination of a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestTopic {
    pub sender_module: ModuleKind,
    pub sender_id: String,
    pub receiver_module: ModuleKind,
    pub receiver_id: String,
    pub request_id: RequestId,
    pub operation: Operation,
}

/// Destination of the reply to a [`RequestTopic`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResponseTopic {
    pub sender_module: ModuleKind,
    pub sender_id: String,
    pub receiver_module: ModuleKind,
    pub receiver_id: String,
    pub request_id: RequestId,
}

/// Request from `identity` to its database module.
pub fn request_topic(identity: &Identity, request_id: RequestId, operation: Operation) -> RequestTopic {
    RequestTopic {
        sender_module: identity.sender_module.clone(),
        sender_id: identity.sender_id.clone(),
        receiver_module: ModuleKind::Db,
        receiver_id: identity.db_id.clone(),
        request_id,
        operation,
    }
}

/// The topic a reply to `request` is published on.
pub fn response_topic_for(request: &RequestTopic) -> ResponseTopic {
    request.to_response()
}

/// Filter matching every reply the database module sends to `identity`,
/// whatever its request id.
pub fn wildcard_reply_filter(identity: &Identity) -> String {
    [
        RESPONSE_PREFIX,
        ModuleKind::Db.as_str(),
        identity.db_id.as_str(),
        identity.sender_module.as_str(),
        identity.sender_id.as_str(),
        SINGLE_LEVEL_WILDCARD,
    ]
    .join("/")
}

/// Filter matching every request addressed to `receiver_module/receiver_id`,
/// from any sender and for any operation.
pub fn incoming_request_filter(receiver_module: &ModuleKind, receiver_id: &str) -> String {
    [
        REQUEST_PREFIX,
        SINGLE_LEVEL_WILDCARD,
        SINGLE_LEVEL_WILDCARD,
        receiver_module.as_str(),
        receiver_id,
        SINGLE_LEVEL_WILDCARD,
        SINGLE_LEVEL_WILDCARD,
    ]
    .join("/")
}

impl RequestTopic {
    /// Swap the parties and keep the request id.
    pub fn to_response(&self) -> ResponseTopic {
        ResponseTopic {
            sender_module: self.receiver_module.clone(),
            sender_id: self.receiver_id.clone(),
            receiver_module: self.sender_module.clone(),
            receiver_id: self.sender_id.clone(),
            request_id: self.request_id,
        }
    }

    pub fn parse(topic: &str) -> Result<Self, TopicError> {
        let levels = split_levels(topic, REQUEST_PREFIX, REQUEST_LEVELS)?;
        Ok(Self {
            sender_module: ModuleKind::from(levels[1]),
            sender_id: levels[2].to_string(),
            receiver_module: ModuleKind::from(levels[3]),
            receiver_id: levels[4].to_string(),
            request_id: parse_request_id(levels[5])?,
            operation: levels[6].parse()?,
        })
    }
}

impl ResponseTopic {
    pub fn parse(topic: &str) -> Result<Self, TopicError> {
        let levels = split_levels(topic, RESPONSE_PREFIX, RESPONSE_LEVELS)?;
        Ok(Self {
            sender_module: ModuleKind::from(levels[1]),
            sender_id: levels[2].to_string(),
            receiver_module: ModuleKind::from(levels[3]),
            receiver_id: levels[4].to_string(),
            request_id: parse_request_id(levels[5])?,
        })
    }
}

impl fmt::Display for RequestTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}/{}/{}/{}",
            REQUEST_PREFIX,
            self.sender_module,
            self.sender_id,
            self.receiver_module,
            self.receiver_id,
            self.request_id,
            self.operation
        )
    }
}

impl fmt::Display for ResponseTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}/{}/{}",
            RESPONSE_PREFIX,
            self.sender_module,
            self.sender_id,
            self.receiver_module,
            self.receiver_id,
            self.request_id
        )
    }
}

fn split_levels<'a>(
    topic: &'a str,
    prefix: &'static str,
    expected: usize,
) -> Result<Vec<&'a str>, TopicError> {
    let levels: Vec<&str> = topic.split('/').collect();
    if levels.len() != expected {
        return Err(TopicError::LevelCount {
            topic: topic.to_string(),
            found: levels.len(),
            expected,
        });
    }
    if levels[0] != prefix {
        return Err(TopicError::Prefix {
            topic: topic.to_string(),
            expected: prefix,
        });
    }
    if levels.iter().any(|level| level.is_empty()) {
        return Err(TopicError::EmptyLevel {
            topic: topic.to_string(),
        });
    }
    Ok(levels)
}

fn parse_request_id(level: &str) -> Result<RequestId, TopicError> {
    RequestId::parse(level).map_err(|_| TopicError::RequestId(level.to_string()))
}
