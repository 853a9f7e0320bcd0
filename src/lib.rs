//! OpenAI-compatible gateway over local, hosted and cloud-managed LLM providers.
//!
//! Requests name generic models (`gpt-3.5-turbo`, `gpt-4`, `text-embedding-ada-002`);
//! the gateway picks a provider, translates the model id, calls the provider and
//! returns responses in one canonical shape.

pub mod client;
pub mod config;
pub mod error;
pub mod llm;
pub mod router;
pub mod service;

pub use error::{GatewayError, Result};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::client::GatewayClient;
    pub use crate::config::GatewayConfig;
    pub use crate::error::{GatewayError, Result};
    pub use crate::llm::{
        CompletionRequest, CompletionResponse, EmbeddingRequest, EmbeddingResponse, LlmGateway,
        LlmMessage, MessageRole, Provider, ProviderRegistry,
    };
    pub use crate::router::{CompletionRouter, CompletionStream, EmbeddingRouter, StreamEvent};
}
