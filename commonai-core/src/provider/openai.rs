//! OpenAI chat completions API.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use std::sync::Arc;
use tracing::debug;

use super::utils::{check_status, truncate};
use super::wire::{self, ChatRequest, ChatResponse, ModelsResponse};
use crate::chat::{HistoryChat, StreamSource};
use crate::config::{OpenAiConfig, OpenAiCredentials};
use crate::error::{Error, Result};
use crate::model::{Chat, Model, Service};
use crate::stream::UpdateStream;
use crate::types::{Completion, Content, ModelInfo};

const PROVIDER_NAME: &str = "OpenAI";
const PROVIDER_TAG: &str = "openai";

struct OpenAiClient {
    http: Client,
    base_url: String,
    api_key: String,
    organization: Option<String>,
}

impl OpenAiClient {
    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        let builder = builder.bearer_auth(&self.api_key);
        match &self.organization {
            Some(org) => builder.header("OpenAI-Organization", org),
            None => builder,
        }
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.request(self.http.get(format!("{}{}", self.base_url, path)))
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.request(self.http.post(format!("{}{}", self.base_url, path)))
    }
}

pub struct OpenAiService {
    client: Arc<OpenAiClient>,
}

impl OpenAiService {
    pub fn new(api_key: impl Into<String>, organization: Option<String>) -> Self {
        Self::with_base_url(OpenAiConfig::default().base_url(), api_key, organization)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        organization: Option<String>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: Arc::new(OpenAiClient {
                http: Client::new(),
                base_url,
                api_key: api_key.into(),
                organization,
            }),
        }
    }

    /// Builds a service from config, falling back to the `OPENAI_*` variables
    /// for credentials.
    pub fn from_config(config: &OpenAiConfig) -> Result<Self> {
        let credentials = OpenAiCredentials::resolve(config);
        let api_key = credentials
            .api_key
            .ok_or_else(|| Error::MissingCredential(PROVIDER_NAME.to_string()))?;

        Ok(Self::with_base_url(
            config.base_url(),
            api_key,
            credentials.organization,
        ))
    }
}

#[async_trait]
impl Service for OpenAiService {
    fn provider_name(&self) -> &str {
        PROVIDER_NAME
    }

    fn model(&self, name: &str) -> Arc<dyn Model> {
        Arc::new(OpenAiModel {
            name: name.to_string(),
            client: Arc::clone(&self.client),
        })
    }

    async fn list_models(&self, page_size: Option<usize>) -> Result<Vec<ModelInfo>> {
        let response = check_status(self.client.get("/models").send().await?).await?;
        let models: ModelsResponse = response.json().await?;
        Ok(truncate(models.into_catalog(), page_size))
    }
}

#[derive(Clone)]
pub struct OpenAiModel {
    name: String,
    client: Arc<OpenAiClient>,
}

impl OpenAiModel {
    async fn send_request(&self, contents: &[Content], stream: bool) -> Result<reqwest::Response> {
        let request = ChatRequest {
            model: &self.name,
            messages: wire::messages(contents),
            stream,
        };

        debug!(model = %self.name, turns = contents.len(), stream, "Sending OpenAI chat request");

        let response = self
            .client
            .post("/chat/completions")
            .json(&request)
            .send()
            .await?;
        check_status(response).await
    }
}

#[async_trait]
impl Model for OpenAiModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, contents: &[Content]) -> Result<Completion> {
        let response: ChatResponse = self.send_request(contents, false).await?.json().await?;
        Ok(response.into_completion(&self.name, PROVIDER_TAG))
    }

    fn start_chat(&self, history: Vec<Content>) -> Box<dyn Chat> {
        Box::new(HistoryChat::new(self.clone(), history))
    }
}

#[async_trait]
impl StreamSource for OpenAiModel {
    async fn open_stream(&self, contents: Vec<Content>) -> Result<UpdateStream> {
        let response = self.send_request(&contents, true).await?;
        Ok(wire::sse_deltas(response))
    }
}
