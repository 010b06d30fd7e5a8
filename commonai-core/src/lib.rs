//! commonai-core - Provider-agnostic conversational LLM engine
//!
//! Provides the pieces every backend shares:
//! - Canonical message model (`Content`, `Completion`, ...)
//! - Capability traits (`Model`, `Chat`, `Service`)
//! - Transcript reconciliation for session-style backends
//! - Stream normalization with commit-once chat history
//! - Provider adapters (OpenAI, Google, Ollama, Apple Intelligence)
//!
//! ## Primary API
//!
//! Build a [`Service`] with [`provider::create_service`], ask it for a
//! [`Model`], then call `complete` or start a [`Chat`].

// Public modules
pub mod chat;
pub mod config;
pub mod error;
pub mod model;
pub mod provider;
pub mod stream;
pub mod transcript;
pub mod types;

// Public exports
pub use chat::{HistoryChat, StreamSource};
pub use config::{Config, ConfigError, OpenAiCredentials};
pub use error::{Error, Result, TransportError};
pub use model::{Chat, Model, Service};
pub use provider::create_service;
pub use stream::{MessageStream, StreamUpdate, UpdateStream};
pub use transcript::{PromptContext, Transcript, TranscriptEntry};
pub use types::{Choice, Completion, Content, Message, ModelInfo, Part, Role, Usage};
