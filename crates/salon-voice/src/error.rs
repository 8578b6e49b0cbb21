//! Error types for the Salon voice layer

use thiserror::Error;

/// Result type alias for voice operations
pub type VoiceResult<T> = Result<T, VoiceError>;

/// Errors that can occur while synthesizing or playing speech
#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("Audio device error: {0}")]
    AudioDevice(String),

    #[error("Audio playback error: {0}")]
    Playback(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TTS error: {0}")]
    Tts(String),

    #[error("TTS API error {status}: {body}")]
    TtsApi { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl VoiceError {
    /// True for failures caused by bad setup rather than a single bad request.
    pub fn is_config(&self) -> bool {
        matches!(self, VoiceError::Config(_) | VoiceError::AudioDevice(_))
    }
}
