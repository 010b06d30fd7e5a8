//! OpenAI-compatible chat completion wire types.
//!
//! Spoken by the OpenAI API and by the Foundation Models bridge.

use futures::future::ready;
use futures::{StreamExt, TryStreamExt};
use reqwest::Response;
use serde::{Deserialize, Serialize};

use super::utils::{error_event, sse_data};
use crate::error::Result;
use crate::stream::{StreamUpdate, UpdateStream};
use crate::types::{Choice, Completion, Content, Message, ModelInfo, Role, Usage};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role: role_name(role).to_string(),
            content: content.into(),
        }
    }
}

pub(crate) fn role_name(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Model => "assistant",
        Role::System => "system",
    }
}

pub(crate) fn messages(contents: &[Content]) -> Vec<ChatMessage> {
    contents
        .iter()
        .map(|content| ChatMessage::new(content.role, content.text()))
        .collect()
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponse {
    pub id: Option<String>,
    pub created: Option<i64>,
    #[serde(default)]
    pub choices: Vec<ResponseChoice>,
    pub usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResponseChoice {
    pub index: Option<usize>,
    pub message: ResponseMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResponseMessage {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireUsage {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

impl From<WireUsage> for Usage {
    fn from(usage: WireUsage) -> Self {
        Usage {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        }
    }
}

impl ChatResponse {
    /// Converts into a [`Completion`] under a fresh id. The backend's own id
    /// is kept as `response_id` metadata.
    pub fn into_completion(self, model: &str, provider: &str) -> Completion {
        let choices = self
            .choices
            .into_iter()
            .enumerate()
            .map(|(position, choice)| {
                Choice::new(
                    choice.index.unwrap_or(position),
                    Message::model(choice.message.content.unwrap_or_default()),
                    choice.finish_reason,
                )
            })
            .collect();

        let mut completion = Completion::new(model, choices)
            .with_usage(self.usage.map(Usage::from))
            .with_metadata([("provider", provider)]);

        if let Some(created) = self.created {
            completion = completion.with_created(created);
        }
        if let Some(id) = self.id {
            completion = completion.with_metadata([("response_id", id)]);
        }
        completion
    }
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: Option<StreamDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

fn parse_delta(data: &str) -> Result<StreamUpdate> {
    let chunk: StreamChunk = serde_json::from_str(data)?;
    if let Some(error) = chunk.error {
        return Err(error_event(error));
    }
    let text = chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta)
        .and_then(|delta| delta.content)
        .unwrap_or_default();
    Ok(StreamUpdate::Delta(text))
}

/// Content deltas of a streaming chat completion.
pub(crate) fn sse_deltas(response: Response) -> UpdateStream {
    sse_data(response)
        .and_then(|data| ready(parse_delta(&data)))
        .boxed()
}

#[derive(Debug, Deserialize)]
pub(crate) struct ModelsResponse {
    #[serde(default)]
    pub data: Vec<WireModel>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireModel {
    pub id: String,
}

impl ModelsResponse {
    pub fn into_catalog(self) -> Vec<ModelInfo> {
        self.data.into_iter().map(|m| ModelInfo::new(m.id)).collect()
    }
}
