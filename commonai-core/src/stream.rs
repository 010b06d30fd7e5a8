//! Stream normalization.
//!
//! Providers reveal a reply in different shapes: token deltas (SSE, NDJSON)
//! or full snapshots per event. [`MessageStream`] turns either into one
//! contract: an ordered, finite, cancellable sequence of [`Message`]s where
//! each item carries the cumulative text of the reply so far.
//!
//! A producer task pulls the upstream and pushes into a bounded channel.
//! Dropping the [`MessageStream`] cancels the producer, which drops the
//! upstream and with it the underlying transport.

use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::debug;

use crate::error::{Error, Result};
use crate::types::Message;

const CHANNEL_CAPACITY: usize = 32;

/// One increment as delivered by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamUpdate {
    /// Newly generated text to append.
    Delta(String),
    /// Full text of the reply so far.
    Snapshot(String),
}

/// Upstream of a [`MessageStream`], as produced by an adapter.
pub type UpdateStream = BoxStream<'static, Result<StreamUpdate>>;

/// Cumulative stream of a single reply.
///
/// Ends either naturally (after zero or more items) or with exactly one error
/// item. Must be created inside a Tokio runtime.
pub struct MessageStream {
    inner: ReceiverStream<Result<Message>>,
    _cancel: Option<DropGuard>,
}

impl MessageStream {
    /// Spawns a producer that awaits `open` and normalizes what it yields.
    ///
    /// `on_complete` receives the final text once the upstream ends naturally
    /// with non-empty text. It runs before the stream reports its end, and
    /// never runs after an error or a cancellation.
    pub fn spawn<F, C>(open: F, on_complete: C) -> Self
    where
        F: Future<Output = Result<UpdateStream>> + Send + 'static,
        C: FnOnce(String) + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();

        tokio::spawn(produce(open, on_complete, tx, cancel.clone()));

        Self {
            inner: ReceiverStream::new(rx),
            _cancel: Some(cancel.drop_guard()),
        }
    }

    /// A stream that fails with `err` on first poll.
    pub fn failed(err: Error) -> Self {
        let (tx, rx) = mpsc::channel(1);
        // Capacity 1 and a live receiver: this cannot fail.
        let _ = tx.try_send(Err(err));

        Self {
            inner: ReceiverStream::new(rx),
            _cancel: None,
        }
    }

    /// Drains the stream and returns the final cumulative text.
    pub async fn collect_text(mut self) -> Result<String> {
        let mut text = String::new();
        while let Some(message) = self.next().await {
            text = message?.text;
        }
        Ok(text)
    }
}

impl Stream for MessageStream {
    type Item = Result<Message>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl std::fmt::Debug for MessageStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageStream").finish_non_exhaustive()
    }
}

async fn produce<F, C>(
    open: F,
    on_complete: C,
    tx: mpsc::Sender<Result<Message>>,
    cancel: CancellationToken,
) where
    F: Future<Output = Result<UpdateStream>> + Send + 'static,
    C: FnOnce(String) + Send + 'static,
{
    let opened = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!("Stream dropped before the upstream opened");
            return;
        }
        opened = open => opened,
    };

    let mut upstream = match opened {
        Ok(upstream) => upstream,
        Err(err) => {
            let _ = tx.send(Err(err)).await;
            return;
        }
    };

    let mut text = Accumulator::default();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Stream dropped by consumer, discarding partial reply");
                return;
            }
            next = upstream.next() => next,
        };

        match next {
            Some(Ok(update)) => {
                if let Some(cumulative) = text.apply(update) {
                    if tx.send(Ok(Message::model(cumulative))).await.is_err() {
                        debug!("Stream consumer went away");
                        return;
                    }
                }
            }
            Some(Err(err)) => {
                let _ = tx.send(Err(err)).await;
                return;
            }
            None => break,
        }
    }

    let final_text = text.into_inner();
    debug!(chars = final_text.len(), "Stream finished");
    if !final_text.is_empty() {
        on_complete(final_text);
    }
}

/// Running text of one reply. Only growth is reported.
#[derive(Debug, Default)]
struct Accumulator {
    text: String,
}

impl Accumulator {
    fn apply(&mut self, update: StreamUpdate) -> Option<String> {
        match update {
            StreamUpdate::Delta(delta) => {
                if delta.is_empty() {
                    return None;
                }
                self.text.push_str(&delta);
            }
            StreamUpdate::Snapshot(snapshot) => {
                if snapshot.len() <= self.text.len() {
                    return None;
                }
                self.text = snapshot;
            }
        }
        Some(self.text.clone())
    }

    fn into_inner(self) -> String {
        self.text
    }
}
