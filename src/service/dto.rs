//! OpenAI-compatible request and response bodies.
//!
//! Domain types live in `crate::llm`; this module handles the wire mapping and is
//! shared by the HTTP handlers and [`crate::client::GatewayClient`].

use crate::error::{GatewayError, Result};
use crate::llm::models::{
    CompletionChunk, CompletionRequest, CompletionResponse, EmbeddingInput, EmbeddingRequest,
    EmbeddingResponse, LlmMessage, MessageRole, Usage,
};
use crate::llm::provider::Provider;
use crate::llm::resolver::ModelNameResolver;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

fn default_chat_model() -> String {
    DEFAULT_CHAT_MODEL.to_string()
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn parse_provider(name: Option<&str>) -> Result<Option<Provider>> {
    name.map(str::parse).transpose()
}

/// New completion id in OpenAI's `chatcmpl-` form
pub fn completion_id() -> String {
    format!("chatcmpl-{}", uuid::Uuid::new_v4().simple())
}

// =============================================================================
// Chat completions
// =============================================================================

/// Request to /v1/chat/completions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionBody {
    #[serde(default = "default_chat_model")]
    pub model: String,
    pub messages: Vec<LlmMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

impl ChatCompletionBody {
    pub fn new(model: impl Into<String>, messages: Vec<LlmMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            max_tokens: None,
            stream: false,
            provider: None,
        }
    }

    /// Validate and convert into a routing request
    pub fn into_request(self) -> Result<CompletionRequest> {
        let model = self.model.trim();
        if model.is_empty() {
            return Err(GatewayError::InvalidRequest("model must not be empty".to_string()));
        }
        if self.messages.is_empty() {
            return Err(GatewayError::InvalidRequest("messages must not be empty".to_string()));
        }

        Ok(CompletionRequest {
            model: model.to_string(),
            messages: self.messages,
            temperature: self.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            max_tokens: self.max_tokens,
            stream: self.stream,
            provider: parse_provider(self.provider.as_deref())?,
        })
    }
}

/// Non-streaming chat completion object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionObject {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub provider: Provider,
    pub choices: Vec<ChatChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatChoice {
    pub index: u32,
    pub message: LlmMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

impl ChatCompletionObject {
    pub fn from_response(response: CompletionResponse) -> Self {
        Self {
            id: completion_id(),
            object: "chat.completion".to_string(),
            created: chrono::Utc::now().timestamp(),
            model: response.model,
            provider: response.provider,
            choices: vec![ChatChoice {
                index: 0,
                message: LlmMessage {
                    role: MessageRole::Assistant,
                    content: response.content,
                },
                finish_reason: response.finish_reason,
            }],
            usage: response.usage,
        }
    }

    /// Text of the first choice
    pub fn content(&self) -> &str {
        self.choices.first().map(|c| c.message.content.as_str()).unwrap_or_default()
    }
}

/// Streaming chunk object carried in one SSE frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionChunkObject {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub provider: Provider,
    pub choices: Vec<ChunkChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkChoice {
    pub index: u32,
    pub delta: ChatDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl ChatCompletionChunkObject {
    pub fn from_chunk(id: &str, created: i64, chunk: CompletionChunk) -> Self {
        let content = (!chunk.content.is_empty()).then_some(chunk.content);

        Self {
            id: id.to_string(),
            object: "chat.completion.chunk".to_string(),
            created,
            model: chunk.model,
            provider: chunk.provider,
            choices: vec![ChunkChoice {
                index: 0,
                delta: ChatDelta { content },
                finish_reason: chunk.finish_reason,
            }],
            usage: chunk.usage,
        }
    }

    /// Content delta of the first choice, if any
    pub fn delta(&self) -> Option<&str> {
        self.choices.first().and_then(|c| c.delta.content.as_deref())
    }
}

// =============================================================================
// Embeddings
// =============================================================================

/// Request to /v1/embeddings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingsBody {
    pub input: EmbeddingInput,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

impl EmbeddingsBody {
    pub fn into_request(self) -> Result<EmbeddingRequest> {
        let inputs = self.input.into_vec();
        if inputs.is_empty() {
            return Err(GatewayError::InvalidRequest("input must not be empty".to_string()));
        }

        let model = self.model.trim();
        if model.is_empty() {
            return Err(GatewayError::InvalidRequest("model must not be empty".to_string()));
        }

        Ok(EmbeddingRequest {
            inputs,
            model: model.to_string(),
            provider: parse_provider(self.provider.as_deref())?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingsObject {
    pub object: String,
    pub data: Vec<EmbeddingData>,
    pub model: String,
    pub provider: Provider,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingData {
    pub object: String,
    pub index: usize,
    pub embedding: Vec<f32>,
}

impl From<EmbeddingResponse> for EmbeddingsObject {
    fn from(response: EmbeddingResponse) -> Self {
        Self {
            object: "list".to_string(),
            data: response
                .embeddings
                .into_iter()
                .enumerate()
                .map(|(index, embedding)| EmbeddingData {
                    object: "embedding".to_string(),
                    index,
                    embedding,
                })
                .collect(),
            model: response.model,
            provider: response.provider,
            usage: response.usage,
        }
    }
}

impl EmbeddingsObject {
    /// Vectors ordered by their `index`
    pub fn into_vectors(mut self) -> Vec<Vec<f32>> {
        self.data.sort_by_key(|d| d.index);
        self.data.into_iter().map(|d| d.embedding).collect()
    }
}

// =============================================================================
// Catalog, health and provider switching
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsList {
    pub object: String,
    pub data: Vec<ModelEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub id: String,
    pub object: String,
    pub owned_by: String,
    pub providers: Vec<Provider>,
}

impl ModelsList {
    pub fn from_resolver(resolver: &ModelNameResolver) -> Self {
        Self {
            object: "list".to_string(),
            data: resolver
                .catalog()
                .into_iter()
                .map(|(id, providers)| ModelEntry {
                    id: id.to_string(),
                    object: "model".to_string(),
                    owned_by: "gateway".to_string(),
                    providers,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub default_provider: Provider,
    /// Provider name to configured flag
    pub providers: BTreeMap<String, bool>,
}

/// Provider for /v1/provider/switch, as JSON body or query string
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SwitchBody {
    #[serde(default)]
    pub provider: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchResponse {
    pub status: String,
    pub provider: Provider,
    pub previous: Provider,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderStatus {
    pub default_provider: Provider,
    pub configured: bool,
    pub local_available: bool,
}

// =============================================================================
// Errors
// =============================================================================

/// Error body matching OpenAI's format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
    pub r#type: String,
    pub code: u16,
}

impl From<&GatewayError> for ErrorResponse {
    fn from(err: &GatewayError) -> Self {
        Self {
            error: ErrorDetail {
                message: err.to_string(),
                r#type: err.error_type().to_string(),
                code: err.status_code(),
            },
        }
    }
}
