//! Capability traits implemented by every provider.
//!
//! A [`Service`] discovers and hands out [`Model`]s; a [`Model`] answers
//! single-shot completions and starts [`Chat`] sessions that keep their own
//! history.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::stream::MessageStream;
use crate::types::{Completion, Content, Message, ModelInfo};

/// Stateless completion entry point for one named model.
///
/// Implementations hold only credentials and a backend handle, so one
/// instance can serve many concurrent call sites.
#[async_trait]
pub trait Model: Send + Sync {
    fn name(&self) -> &str;

    /// Sends the whole conversation and waits for the full response.
    ///
    /// An empty `contents` slice is passed through to the provider, which may
    /// reject it with an error.
    async fn complete(&self, contents: &[Content]) -> Result<Completion>;

    /// Starts a chat seeded with `history`.
    fn start_chat(&self, history: Vec<Content>) -> Box<dyn Chat>;

    async fn complete_text(&self, text: &str) -> Result<Completion> {
        self.complete(&[Content::user(text)]).await
    }

    async fn generate(&self, contents: &[Content]) -> Result<Message> {
        Ok(self.complete(contents).await?.primary_message())
    }

    async fn generate_text(&self, text: &str) -> Result<Message> {
        Ok(self.complete_text(text).await?.primary_message())
    }
}

/// A multi-turn session that owns its history.
///
/// Methods take `&mut self`: one caller drives a chat at a time. Starting a
/// second exchange while a stream from this chat is still live is not
/// supported.
#[async_trait]
pub trait Chat: Send + Sync {
    /// Snapshot of the turns committed so far, in send order.
    fn history(&self) -> Vec<Content>;

    /// Sends `contents` after the current history and commits both the
    /// contents and the reply once the reply arrives.
    async fn send(&mut self, contents: Vec<Content>) -> Result<Message>;

    /// Like [`Chat::send`], revealing the reply incrementally.
    ///
    /// Each item carries the cumulative text of the reply. The turn is
    /// committed only when the stream ends naturally with non-empty text.
    fn send_stream(&mut self, contents: Vec<Content>) -> MessageStream;
}

/// Model discovery and construction for one provider.
#[async_trait]
pub trait Service: Send + Sync {
    fn provider_name(&self) -> &str;

    fn model(&self, name: &str) -> Arc<dyn Model>;

    /// Lists the provider's catalog. `Some(n)` keeps at most the first `n`
    /// entries in catalog order.
    async fn list_models(&self, page_size: Option<usize>) -> Result<Vec<ModelInfo>>;
}
