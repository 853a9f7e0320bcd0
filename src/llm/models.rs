use crate::llm::provider::Provider;
use serde::{Deserialize, Serialize};

/// Message role in LLM conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
        }
    }
}

/// Message in LLM conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmMessage {
    pub role: MessageRole,
    #[serde(default)]
    pub content: String,
}

impl LlmMessage {
    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Token accounting reported by a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Provider-independent completion request
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Generic model id; resolved to a native id per provider
    pub model: String,
    pub messages: Vec<LlmMessage>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub stream: bool,
    /// Explicit provider; the registry default is used when absent
    pub provider: Option<Provider>,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<LlmMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: 0.7,
            max_tokens: None,
            stream: false,
            provider: None,
        }
    }

    pub fn with_provider(mut self, provider: Provider) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn streaming(mut self) -> Self {
        self.stream = true;
        self
    }
}

/// Canonical completion result, independent of the serving backend
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResponse {
    /// Resolved native model id
    pub model: String,
    pub provider: Provider,
    pub content: String,
    pub usage: Option<Usage>,
    pub finish_reason: Option<String>,
}

/// One incremental piece of a streamed completion
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionChunk {
    pub model: String,
    pub provider: Provider,
    /// Content delta carried by this chunk; may be empty on the final chunk
    pub content: String,
    pub finish_reason: Option<String>,
    pub usage: Option<Usage>,
}

/// Single string or batch, as accepted by OpenAI-style embedding endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EmbeddingInput {
    Single(String),
    Batch(Vec<String>),
}

impl EmbeddingInput {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            EmbeddingInput::Single(text) => vec![text],
            EmbeddingInput::Batch(texts) => texts,
        }
    }
}

impl From<&str> for EmbeddingInput {
    fn from(text: &str) -> Self {
        EmbeddingInput::Single(text.to_string())
    }
}

impl From<Vec<String>> for EmbeddingInput {
    fn from(texts: Vec<String>) -> Self {
        EmbeddingInput::Batch(texts)
    }
}

/// Provider-independent embedding request
#[derive(Debug, Clone)]
pub struct EmbeddingRequest {
    pub inputs: Vec<String>,
    pub model: String,
    pub provider: Option<Provider>,
}

impl EmbeddingRequest {
    pub fn new(model: impl Into<String>, inputs: Vec<String>) -> Self {
        Self {
            inputs,
            model: model.into(),
            provider: None,
        }
    }

    pub fn with_provider(mut self, provider: Provider) -> Self {
        self.provider = Some(provider);
        self
    }
}

/// One vector per input, in input order
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingResponse {
    pub provider: Provider,
    pub model: String,
    pub embeddings: Vec<Vec<f32>>,
    pub usage: Option<Usage>,
}
