//! Normalized completion stream.
//!
//! A [`CompletionStream`] wraps one backend [`ChunkStream`] and yields
//! [`StreamEvent`]s: every backend chunk in arrival order, then exactly one
//! terminal event. A clean close ends with [`StreamEvent::Done`]; a backend
//! failure ends with [`StreamEvent::Error`] and no `Done`. The stream is finite
//! and cannot be restarted.

use crate::error::GatewayError;
use crate::llm::gateway::ChunkStream;
use crate::llm::models::CompletionChunk;
use crate::llm::provider::Provider;
use futures::stream::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug)]
pub enum StreamEvent {
    Chunk(CompletionChunk),
    Error(GatewayError),
    Done,
}

pub struct CompletionStream {
    inner: ChunkStream,
    model: String,
    provider: Provider,
    cancel: CancellationToken,
    finished: bool,
    chunks: usize,
}

impl CompletionStream {
    pub fn new(
        inner: ChunkStream,
        model: impl Into<String>,
        provider: Provider,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            inner,
            model: model.into(),
            provider,
            cancel,
            finished: false,
            chunks: 0,
        }
    }

    /// Resolved native model id this stream is served by
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// Stop the backend request. The stream ends without a terminal event.
    pub fn cancel(&mut self) {
        if !self.finished {
            debug!(provider = %self.provider, chunks = self.chunks, "Completion stream cancelled");
        }
        self.finished = true;
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl Stream for CompletionStream {
    type Item = StreamEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if this.finished {
            return Poll::Ready(None);
        }

        match this.inner.as_mut().poll_next(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(Ok(chunk))) => {
                this.chunks += 1;
                Poll::Ready(Some(StreamEvent::Chunk(CompletionChunk {
                    model: this.model.clone(),
                    provider: this.provider,
                    content: chunk.content,
                    finish_reason: chunk.finish_reason,
                    usage: chunk.usage,
                })))
            }
            Poll::Ready(Some(Err(e))) => {
                warn!(provider = %this.provider, "Completion stream failed: {}", e);
                this.finished = true;
                Poll::Ready(Some(StreamEvent::Error(e)))
            }
            Poll::Ready(None) => {
                debug!(provider = %this.provider, chunks = this.chunks, "Completion stream done");
                this.finished = true;
                Poll::Ready(Some(StreamEvent::Done))
            }
        }
    }
}

impl Drop for CompletionStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
