//! Ollama local runtime (`/api/chat`, `/api/tags`).
//!
//! Requests go through transcript reconciliation, so a conversation that does
//! not end on a user turn is rejected before anything is sent.

use async_trait::async_trait;
use futures::future::ready;
use futures::{StreamExt, TryStreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use super::utils::{check_status, connect_error, ndjson_lines, truncate};
use super::wire::role_name;
use crate::chat::{HistoryChat, StreamSource};
use crate::config::OllamaConfig;
use crate::error::{Result, TransportError};
use crate::model::{Chat, Model, Service};
use crate::stream::{StreamUpdate, UpdateStream};
use crate::transcript::Transcript;
use crate::types::{Choice, Completion, Content, Message, ModelInfo, Usage};

const PROVIDER_NAME: &str = "Ollama";
const PROVIDER_TAG: &str = "ollama";

struct OllamaClient {
    http: Client,
    base_url: String,
}

pub struct OllamaService {
    client: Arc<OllamaClient>,
}

impl OllamaService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Arc::new(OllamaClient {
                http: Client::new(),
                base_url: base_url.into().trim_end_matches('/').to_string(),
            }),
        }
    }

    pub fn from_config(config: &OllamaConfig) -> Self {
        let base_url = config.base_url();
        info!("Using Ollama at {}", base_url);
        Self::new(base_url)
    }
}

#[async_trait]
impl Service for OllamaService {
    fn provider_name(&self) -> &str {
        PROVIDER_NAME
    }

    fn model(&self, name: &str) -> Arc<dyn Model> {
        Arc::new(OllamaModel {
            name: name.to_string(),
            client: Arc::clone(&self.client),
        })
    }

    async fn list_models(&self, page_size: Option<usize>) -> Result<Vec<ModelInfo>> {
        let url = format!("{}/api/tags", self.client.base_url);
        let response = self
            .client
            .http
            .get(&url)
            .send()
            .await
            .map_err(|err| connect_error(PROVIDER_NAME, err))?;

        let tags: TagsResponse = check_status(response).await?.json().await?;

        let catalog = tags
            .models
            .into_iter()
            .map(|m| {
                let description = m.details.and_then(|d| {
                    match (d.family, d.parameter_size) {
                        (Some(family), Some(size)) => Some(format!("{family} {size}")),
                        (family, size) => family.or(size),
                    }
                });
                ModelInfo::new(m.name).with_description(description)
            })
            .collect();

        Ok(truncate(catalog, page_size))
    }
}

#[derive(Clone)]
pub struct OllamaModel {
    name: String,
    client: Arc<OllamaClient>,
}

impl OllamaModel {
    async fn send_request(&self, contents: &[Content], stream: bool) -> Result<reqwest::Response> {
        let context = Transcript::reconcile(contents)?;
        let request = ChatRequest {
            model: &self.name,
            messages: context
                .to_turns()
                .into_iter()
                .map(|(role, text)| OllamaMessage {
                    role: role_name(role).to_string(),
                    content: text.to_string(),
                })
                .collect(),
            stream,
        };

        debug!(
            model = %self.name,
            entries = context.transcript.len(),
            stream,
            "Sending Ollama chat request"
        );

        let url = format!("{}/api/chat", self.client.base_url);
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
impl Model for OllamaModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, contents: &[Content]) -> Result<Completion> {
        let response: ChatResponse = self.send_request(contents, false).await?.json().await?;

        let usage = (response.prompt_eval_count.is_some() || response.eval_count.is_some())
            .then(|| Usage {
                prompt_tokens: response.prompt_eval_count,
                completion_tokens: response.eval_count,
                total_tokens: response
                    .prompt_eval_count
                    .zip(response.eval_count)
                    .map(|(prompt, completion)| prompt + completion),
            });

        let text = response.message.map(|m| m.content).unwrap_or_default();
        let choice = Choice::new(0, Message::model(text), response.done_reason);

        Ok(Completion::new(&self.name, vec![choice])
            .with_usage(usage)
            .with_metadata([("provider", PROVIDER_TAG)]))
    }

    fn start_chat(&self, history: Vec<Content>) -> Box<dyn Chat> {
        Box::new(HistoryChat::new(self.clone(), history))
    }
}

#[async_trait]
impl StreamSource for OllamaModel {
    fn validate(&self, contents: &[Content]) -> Result<()> {
        Transcript::reconcile(contents).map(|_| ())
    }

    async fn open_stream(&self, contents: Vec<Content>) -> Result<UpdateStream> {
        let response = self.send_request(&contents, true).await?;

        Ok(ndjson_lines(response)
            .and_then(|line| ready(parse_chunk(&line)))
            .boxed())
    }
}

fn parse_chunk(line: &str) -> Result<StreamUpdate> {
    let chunk: ChatResponse = serde_json::from_str(line)?;
    if let Some(error) = chunk.error {
        return Err(TransportError::Stream(error).into());
    }
    let text = chunk.message.map(|m| m.content).unwrap_or_default();
    Ok(StreamUpdate::Delta(text))
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<OllamaMessage>,
    done_reason: Option<String>,
    prompt_eval_count: Option<u32>,
    eval_count: Option<u32>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
    details: Option<TagDetails>,
}

#[derive(Debug, Deserialize)]
struct TagDetails {
    family: Option<String>,
    parameter_size: Option<String>,
}
