//! History-keeping chat shared by every provider.
//!
//! Adapters only know how to complete a request and open a stream for it.
//! [`HistoryChat`] layers the session on top: it prepends the history to each
//! request and appends the exchange once the reply has fully arrived.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

use crate::error::Result;
use crate::model::{Chat, Model};
use crate::stream::{MessageStream, UpdateStream};
use crate::types::{Content, Message};

/// Streaming half of an adapter.
#[async_trait]
pub trait StreamSource: Send + Sync + 'static {
    /// Rejects a request before any stream is opened.
    fn validate(&self, _contents: &[Content]) -> Result<()> {
        Ok(())
    }

    /// Opens the provider's incremental reply to `contents`.
    async fn open_stream(&self, contents: Vec<Content>) -> Result<UpdateStream>;
}

pub struct HistoryChat<M> {
    model: M,
    history: Arc<Mutex<Vec<Content>>>,
}

impl<M> HistoryChat<M>
where
    M: Model + StreamSource + Clone + 'static,
{
    pub fn new(model: M, history: Vec<Content>) -> Self {
        Self {
            model,
            history: Arc::new(Mutex::new(history)),
        }
    }

    fn request(&self, contents: &[Content]) -> Vec<Content> {
        let history = self.history.lock();
        history.iter().chain(contents).cloned().collect()
    }
}

fn commit(history: &Mutex<Vec<Content>>, contents: Vec<Content>, reply: Content) {
    let mut history = history.lock();
    history.extend(contents);
    history.push(reply);
    debug!(turns = history.len(), "Committed chat exchange");
}

#[async_trait]
impl<M> Chat for HistoryChat<M>
where
    M: Model + StreamSource + Clone + 'static,
{
    fn history(&self) -> Vec<Content> {
        self.history.lock().clone()
    }

    async fn send(&mut self, contents: Vec<Content>) -> Result<Message> {
        let request = self.request(&contents);
        let message = self.model.complete(&request).await?.primary_message();

        commit(&self.history, contents, Content::from(&message));
        Ok(message)
    }

    fn send_stream(&mut self, contents: Vec<Content>) -> MessageStream {
        let request = self.request(&contents);
        if let Err(err) = self.model.validate(&request) {
            return MessageStream::failed(err);
        }

        let model = self.model.clone();
        let history = Arc::clone(&self.history);

        MessageStream::spawn(
            async move { model.open_stream(request).await },
            move |reply| commit(&history, contents, Content::model(reply)),
        )
    }
}
