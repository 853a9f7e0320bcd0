use crate::error::Result;
use crate::llm::models::{LlmMessage, Usage};
use async_trait::async_trait;
use futures::stream::Stream;
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

/// Sampling parameters forwarded to a backend
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionParams {
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: None,
        }
    }
}

/// Complete (buffered) response from a backend
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LlmGatewayResponse {
    pub content: String,
    pub usage: Option<Usage>,
    pub finish_reason: Option<String>,
}

/// Incremental piece of a streamed backend response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamChunk {
    pub content: String,
    pub finish_reason: Option<String>,
    pub usage: Option<Usage>,
}

impl StreamChunk {
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }
}

/// Vectors returned by a backend, already in input order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LlmEmbeddings {
    pub vectors: Vec<Vec<f32>>,
    pub usage: Option<Usage>,
}

/// Owned, single-pass stream of backend chunks
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send>>;

/// Transport to one LLM provider
///
/// Implementations receive the native model id exactly as resolved by the router and
/// strip any namespace the provider's own API does not understand.
#[async_trait]
pub trait LlmGateway: Send + Sync {
    /// Complete a chat request and wait for the whole response
    async fn complete(
        &self,
        model: &str,
        messages: &[LlmMessage],
        params: &CompletionParams,
    ) -> Result<LlmGatewayResponse>;

    /// Stream a chat completion
    ///
    /// The request is not sent until the stream is first polled. Cancelling the token
    /// closes the backend connection and ends the stream.
    fn complete_stream(
        &self,
        model: String,
        messages: Vec<LlmMessage>,
        params: CompletionParams,
        cancel: CancellationToken,
    ) -> ChunkStream;

    /// Embed a batch of inputs, returning one vector per input in input order
    async fn calculate_embeddings(&self, model: &str, inputs: &[String])
        -> Result<LlmEmbeddings>;

    /// Cheap reachability check
    ///
    /// Hosted gateways do not probe the network and report `true`.
    async fn is_available(&self) -> bool {
        true
    }
}
