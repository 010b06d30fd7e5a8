//! Google Generative Language API (Gemini).
//!
//! System turns travel out of band as `systemInstruction`; user and model
//! turns keep their roles. Streaming uses `streamGenerateContent?alt=sse`,
//! where every event carries only the newly generated text.

use async_trait::async_trait;
use futures::future::ready;
use futures::{StreamExt, TryStreamExt};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use super::utils::{check_status, error_event, sse_data, truncate};
use crate::chat::{HistoryChat, StreamSource};
use crate::config::GoogleConfig;
use crate::error::{Error, Result};
use crate::model::{Chat, Model, Service};
use crate::stream::{StreamUpdate, UpdateStream};
use crate::types::{Choice, Completion, Content, Message, ModelInfo, Part, Role, Usage};

const PROVIDER_NAME: &str = "Google Generative AI";
const PROVIDER_TAG: &str = "google-genai";

struct GoogleClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl GoogleClient {
    fn get(&self, path: &str) -> RequestBuilder {
        self.http
            .get(format!("{}{}", self.base_url, path))
            .header("x-goog-api-key", &self.api_key)
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.http
            .post(format!("{}{}", self.base_url, path))
            .header("x-goog-api-key", &self.api_key)
    }
}

pub struct GoogleService {
    client: Arc<GoogleClient>,
}

impl GoogleService {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(GoogleConfig::default().base_url(), api_key)
    }

    pub fn with_base_url(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Arc::new(GoogleClient {
                http: Client::new(),
                base_url: base_url.into().trim_end_matches('/').to_string(),
                api_key: api_key.into(),
            }),
        }
    }

    pub fn from_config(config: &GoogleConfig) -> Result<Self> {
        let api_key = config
            .resolve_api_key()
            .ok_or_else(|| Error::MissingCredential(PROVIDER_NAME.to_string()))?;
        Ok(Self::with_base_url(config.base_url(), api_key))
    }
}

#[async_trait]
impl Service for GoogleService {
    fn provider_name(&self) -> &str {
        PROVIDER_NAME
    }

    fn model(&self, name: &str) -> Arc<dyn Model> {
        Arc::new(GoogleModel {
            name: name.to_string(),
            client: Arc::clone(&self.client),
        })
    }

    async fn list_models(&self, page_size: Option<usize>) -> Result<Vec<ModelInfo>> {
        let mut request = self.client.get("/models");
        if let Some(size) = page_size {
            request = request.query(&[("pageSize", size)]);
        }

        let response = check_status(request.send().await?).await?;
        let listing: ListModelsResponse = response.json().await?;

        let catalog = listing
            .models
            .into_iter()
            .map(|m| {
                ModelInfo::new(m.name)
                    .with_display_name(m.display_name)
                    .with_description(m.description)
                    .with_token_limits(m.input_token_limit, m.output_token_limit)
            })
            .collect();

        Ok(truncate(catalog, page_size))
    }
}

#[derive(Clone)]
pub struct GoogleModel {
    name: String,
    client: Arc<GoogleClient>,
}

impl GoogleModel {
    /// Accepts both `gemini-pro` and `models/gemini-pro`.
    fn resource(&self) -> String {
        let name = self.name.trim_start_matches("models/");
        format!("/models/{name}")
    }

    async fn send_request(&self, contents: &[Content], stream: bool) -> Result<reqwest::Response> {
        let body = GenerateContentRequest::from_contents(contents);
        let request = if stream {
            self.client
                .post(&format!("{}:streamGenerateContent", self.resource()))
                .query(&[("alt", "sse")])
        } else {
            self.client
                .post(&format!("{}:generateContent", self.resource()))
        };

        debug!(model = %self.name, turns = contents.len(), stream, "Sending Gemini request");

        check_status(request.json(&body).send().await?).await
    }
}

#[async_trait]
impl Model for GoogleModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, contents: &[Content]) -> Result<Completion> {
        let response: GenerateContentResponse =
            self.send_request(contents, false).await?.json().await?;
        Ok(response.into_completion(&self.name))
    }

    fn start_chat(&self, history: Vec<Content>) -> Box<dyn Chat> {
        Box::new(HistoryChat::new(self.clone(), history))
    }
}

#[async_trait]
impl StreamSource for GoogleModel {
    async fn open_stream(&self, contents: Vec<Content>) -> Result<UpdateStream> {
        let response = self.send_request(&contents, true).await?;

        Ok(sse_data(response)
            .and_then(|data| ready(parse_chunk(&data)))
            .boxed())
    }
}

fn parse_chunk(data: &str) -> Result<StreamUpdate> {
    let chunk: GenerateContentResponse = serde_json::from_str(data)?;
    if let Some(error) = chunk.error {
        return Err(error_event(error));
    }
    Ok(StreamUpdate::Delta(chunk.text()))
}

#[derive(Debug, Serialize, Deserialize)]
struct WireContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<WirePart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WirePart {
    #[serde(default)]
    text: Option<String>,
}

impl WireContent {
    fn from_content(content: &Content) -> Self {
        Self {
            role: Some(content.role.as_str().to_string()),
            parts: content
                .parts
                .iter()
                .map(|part| match part {
                    Part::Text(text) => WirePart {
                        text: Some(text.clone()),
                    },
                })
                .collect(),
        }
    }

    fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<WireContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<WireContent>,
}

impl GenerateContentRequest {
    fn from_contents(contents: &[Content]) -> Self {
        let (system, conversation): (Vec<&Content>, Vec<&Content>) = contents
            .iter()
            .partition(|content| content.role == Role::System);

        let system_instruction = (!system.is_empty()).then(|| WireContent {
            role: None,
            parts: system
                .iter()
                .map(|content| WirePart {
                    text: Some(content.text()),
                })
                .collect(),
        });

        Self {
            contents: conversation
                .into_iter()
                .map(WireContent::from_content)
                .collect(),
            system_instruction,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<WireContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<u32>,
    candidates_token_count: Option<u32>,
    total_token_count: Option<u32>,
}

impl GenerateContentResponse {
    /// Text of the first candidate.
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .map(WireContent::text)
            .unwrap_or_default()
    }

    fn into_completion(self, model: &str) -> Completion {
        let mut choices: Vec<Choice> = self
            .candidates
            .into_iter()
            .enumerate()
            .map(|(index, candidate)| {
                let text = candidate
                    .content
                    .as_ref()
                    .map(WireContent::text)
                    .unwrap_or_default();
                Choice::new(index, Message::model(text), candidate.finish_reason)
            })
            .collect();

        if choices.is_empty() {
            choices.push(Choice::new(0, Message::model(""), None));
        }

        let usage = self.usage_metadata.map(|usage| Usage {
            prompt_tokens: usage.prompt_token_count,
            completion_tokens: usage.candidates_token_count,
            total_tokens: usage.total_token_count,
        });

        Completion::new(model, choices)
            .with_usage(usage)
            .with_metadata([("provider", PROVIDER_TAG)])
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListModelsResponse {
    #[serde(default)]
    models: Vec<GoogleModelInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleModelInfo {
    name: String,
    display_name: Option<String>,
    description: Option<String>,
    input_token_limit: Option<u32>,
    output_token_limit: Option<u32>,
}
