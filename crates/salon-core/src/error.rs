//! Error types surfaced by the conversation core.
//!
//! Only failures the caller must act on are errors. Generation, synthesis and playback
//! failures inside a running conversation are recovered in place and logged.

use crate::session::TurnId;
use std::time::Duration;
use thiserror::Error;

pub type ConversationResult<T> = Result<T, ConversationError>;

#[derive(Error, Debug)]
pub enum ConversationError {
    #[error("cannot start a conversation without participants")]
    EmptyParticipants,

    #[error("turn not found: {0}")]
    TurnNotFound(TurnId),

    #[error("turn {0} has no synthesized audio")]
    AudioUnavailable(TurnId),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("no Tokio runtime is running on this thread")]
    NoRuntime,
}

impl From<config::ConfigError> for ConversationError {
    fn from(err: config::ConfigError) -> Self {
        ConversationError::Config(err.to_string())
    }
}

/// Failure of a [`ResponseGenerator`](crate::generator::ResponseGenerator) call.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("generation request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("generation API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("generation returned no text")]
    Empty,

    #[error("generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("generator unavailable: {0}")]
    Unavailable(String),
}
