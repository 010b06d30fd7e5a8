//! Provider adapters.
//!
//! Each adapter translates the canonical types to one backend's wire format
//! and back. History keeping, stream normalization and completion ids are
//! shared, so adapters differ only in transport.

pub mod apple;
mod factory;
pub mod google;
pub mod ollama;
pub mod openai;
mod utils;
mod wire;

pub use apple::{AppleModel, AppleModelKind, AppleService};
pub use factory::create_service;
pub use google::{GoogleModel, GoogleService};
pub use ollama::{OllamaModel, OllamaService};
pub use openai::{OpenAiModel, OpenAiService};
