//! Error types for the SUVIDHA voice assistant

use thiserror::Error;

/// Result type alias for voice operations
pub type VoiceResult<T> = Result<T, VoiceError>;

/// Errors raised by speech providers, the guidance service and the orchestrator.
///
/// None of these reach the citizen directly: the guidance client and speech output
/// turn them into empty guidance or a local-synthesis fallback.
#[derive(Error, Debug)]
pub enum VoiceError {
    /// Provider quota exhausted (HTTP 429 / RESOURCE_EXHAUSTED). Expected, not fatal.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Unsupported capability: {0}")]
    Unsupported(String),

    #[error("STT error: {0}")]
    Stt(String),

    #[error("TTS error: {0}")]
    Tts(String),

    #[error("Audio playback error: {0}")]
    Playback(String),

    #[error("Guidance service error: {0}")]
    Guidance(String),

    #[error("Document rejected: {0}")]
    DocumentRejected(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Channel send error: {0}")]
    ChannelSend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl VoiceError {
    /// Quota errors are routed to the local fallback without being reported as failures.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, VoiceError::RateLimited(_))
    }
}

impl From<hound::Error> for VoiceError {
    fn from(err: hound::Error) -> Self {
        VoiceError::Playback(err.to_string())
    }
}

impl From<base64::DecodeError> for VoiceError {
    fn from(err: base64::DecodeError) -> Self {
        VoiceError::Tts(format!("audio payload is not valid base64: {}", err))
    }
}

impl From<suvidha_core::CoreError> for VoiceError {
    fn from(err: suvidha_core::CoreError) -> Self {
        VoiceError::Config(err.to_string())
    }
}
