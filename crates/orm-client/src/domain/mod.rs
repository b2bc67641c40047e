//! Domain types for the client.
//!
//! Pure data and functions: request ids, topic addressing, configuration
//! and errors. Async infrastructure lives in the adapters layer.

pub mod config;
pub mod correlation;
pub mod error;
pub mod topics;

pub use config::{ClientConfig, ConfigError, ReplyRouting};
pub use correlation::RequestId;
pub use error::{OrmError, OrmResult};
pub use topics::{
    incoming_request_filter, request_topic, response_topic_for, wildcard_reply_filter,
    RequestTopic, ResponseTopic, TopicError,
};
