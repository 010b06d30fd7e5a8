//! Apple Intelligence on-device model, reached through the Foundation Models
//! HTTP bridge (`FM_BRIDGE_URL`, default `localhost:11435`).
//!
//! The bridge speaks the OpenAI chat completions format. Every call first
//! checks `/health` so an unready device model reports
//! [`Error::ProviderUnavailable`] instead of a transport failure.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

use super::utils::{check_status, connect_error, truncate};
use super::wire::{self, ChatMessage, ChatRequest, ChatResponse};
use crate::chat::{HistoryChat, StreamSource};
use crate::config::AppleConfig;
use crate::error::{Error, Result};
use crate::model::{Chat, Model, Service};
use crate::stream::UpdateStream;
use crate::transcript::Transcript;
use crate::types::{Completion, Content, ModelInfo};

const PROVIDER_NAME: &str = "Apple Intelligence";
const PROVIDER_TAG: &str = "apple-intelligence";

/// System language model variants exposed by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppleModelKind {
    General,
    ContentTagging,
}

impl AppleModelKind {
    pub const ALL: [AppleModelKind; 2] = [AppleModelKind::General, AppleModelKind::ContentTagging];

    pub fn name(&self) -> &'static str {
        match self {
            AppleModelKind::General => "apple.system.general",
            AppleModelKind::ContentTagging => "apple.system.content-tagging",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            AppleModelKind::General => "Apple Intelligence (General)",
            AppleModelKind::ContentTagging => "Apple Intelligence (Content Tagging)",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            AppleModelKind::General => {
                "Base on-device language model optimized for open-ended text generation."
            }
            AppleModelKind::ContentTagging => {
                "Specialized variant tuned for structured content tagging responses."
            }
        }
    }

    /// Unknown names resolve to [`AppleModelKind::General`].
    pub fn lookup(name: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == name)
            .unwrap_or(AppleModelKind::General)
    }

    fn info(&self) -> ModelInfo {
        ModelInfo::new(self.name())
            .with_display_name(Some(self.display_name().to_string()))
            .with_description(Some(self.description().to_string()))
    }
}

struct BridgeClient {
    http: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
}

impl BridgeClient {
    async fn ensure_available(&self) -> Result<()> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|err| connect_error(PROVIDER_NAME, err))?;

        if !response.status().is_success() {
            return Err(Error::unavailable(
                PROVIDER_NAME,
                format!("bridge health check returned {}", response.status()),
            ));
        }

        let health: HealthResponse = response.json().await?;
        match health.status.as_str() {
            "ok" | "healthy" => Ok(()),
            status => {
                let reason = health.message.unwrap_or_else(|| status.to_string());
                warn!("Apple Intelligence model not ready: {}", reason);
                Err(Error::unavailable(PROVIDER_NAME, reason))
            }
        }
    }
}

pub struct AppleService {
    client: Arc<BridgeClient>,
}

impl AppleService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Arc::new(BridgeClient {
                http: Client::new(),
                base_url: base_url.into().trim_end_matches('/').to_string(),
            }),
        }
    }

    pub fn from_config(config: &AppleConfig) -> Self {
        Self::new(config.base_url())
    }
}

#[async_trait]
impl Service for AppleService {
    fn provider_name(&self) -> &str {
        PROVIDER_NAME
    }

    fn model(&self, name: &str) -> Arc<dyn Model> {
        Arc::new(AppleModel {
            kind: AppleModelKind::lookup(name),
            client: Arc::clone(&self.client),
        })
    }

    /// The catalog is fixed; no request is made.
    async fn list_models(&self, page_size: Option<usize>) -> Result<Vec<ModelInfo>> {
        let catalog = AppleModelKind::ALL.iter().map(AppleModelKind::info).collect();
        Ok(truncate(catalog, page_size))
    }
}

#[derive(Clone)]
pub struct AppleModel {
    kind: AppleModelKind,
    client: Arc<BridgeClient>,
}

impl AppleModel {
    async fn send_request(&self, contents: &[Content], stream: bool) -> Result<reqwest::Response> {
        let context = Transcript::reconcile(contents)?;
        self.client.ensure_available().await?;

        let request = ChatRequest {
            model: self.kind.name(),
            messages: context
                .to_turns()
                .into_iter()
                .map(|(role, text)| ChatMessage::new(role, text))
                .collect(),
            stream,
        };

        debug!(
            model = self.kind.name(),
            entries = context.transcript.len(),
            stream,
            "Sending Foundation Models request"
        );

        let url = format!("{}/v1/chat/completions", self.client.base_url);
        let response = self
            .client
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|err| connect_error(PROVIDER_NAME, err))?;

        check_status(response).await
    }
}

#[async_trait]
impl Model for AppleModel {
    fn name(&self) -> &str {
        self.kind.name()
    }

    async fn complete(&self, contents: &[Content]) -> Result<Completion> {
        let response: ChatResponse = self.send_request(contents, false).await?.json().await?;
        Ok(response.into_completion(self.kind.name(), PROVIDER_TAG))
    }

    fn start_chat(&self, history: Vec<Content>) -> Box<dyn Chat> {
        Box::new(HistoryChat::new(self.clone(), history))
    }
}

#[async_trait]
impl StreamSource for AppleModel {
    fn validate(&self, contents: &[Content]) -> Result<()> {
        Transcript::reconcile(contents).map(|_| ())
    }

    async fn open_stream(&self, contents: Vec<Content>) -> Result<UpdateStream> {
        let response = self.send_request(&contents, true).await?;
        Ok(wire::sse_deltas(response))
    }
}
