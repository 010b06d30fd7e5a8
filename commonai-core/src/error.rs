//! Error taxonomy shared by every provider adapter.
//!
//! Nothing in this crate retries. Errors propagate to the immediate caller of
//! `complete`, `send` or `send_stream` (for streams, as the next item).

use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum Error {
    /// The conversation did not end on a user turn.
    #[error("No user message found to generate a response")]
    MissingPrompt,

    /// The backend reported it cannot serve requests right now.
    #[error("{provider} unavailable: {reason}")]
    ProviderUnavailable { provider: String, reason: String },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("No API key configured for {0}")]
    MissingCredential(String),

    #[error("Unknown provider: {0}. Supported: openai, google, ollama, apple")]
    UnknownProvider(String),
}

/// Failures of the underlying backend call, surfaced verbatim.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Stream failed: {0}")]
    Stream(String),
}

impl Error {
    pub fn unavailable(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ProviderUnavailable {
            provider: provider.into(),
            reason: reason.into(),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(TransportError::Http(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Transport(TransportError::Decode(err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
