//! Service factory keyed by configuration.

use std::sync::Arc;
use tracing::info;

use super::{AppleService, GoogleService, OllamaService, OpenAiService};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::Service;

/// Creates a service instance based on configuration.
///
/// Supported providers:
/// - `"openai"` - OpenAI chat completions API
/// - `"google"` - Google Generative Language API (Gemini)
/// - `"ollama"` - Ollama local runtime
/// - `"apple"` - Apple Intelligence through the Foundation Models bridge
pub fn create_service(config: &Config) -> Result<Arc<dyn Service>> {
    let provider_type = config.provider.to_lowercase();

    info!("Creating service: {}", provider_type);

    match provider_type.as_str() {
        "openai" => {
            let service = OpenAiService::from_config(&config.openai)?;
            info!("Using OpenAI at {}", config.openai.base_url());
            Ok(Arc::new(service))
        }
        "google" | "gemini" => {
            let service = GoogleService::from_config(&config.google)?;
            info!("Using Google Generative AI at {}", config.google.base_url());
            Ok(Arc::new(service))
        }
        "ollama" => Ok(Arc::new(OllamaService::from_config(&config.ollama))),
        "apple" => {
            info!("Using Foundation Models bridge at {}", config.apple.base_url());
            Ok(Arc::new(AppleService::from_config(&config.apple)))
        }
        _ => Err(Error::UnknownProvider(provider_type)),
    }
}
