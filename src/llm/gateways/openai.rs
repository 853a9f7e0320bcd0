//! OpenAI Gateway for LLM interactions.
//!
//! This module provides a gateway for the hosted OpenAI API: chat completions,
//! streaming over server-sent events, and batched embeddings.

use crate::error::{GatewayError, Result};
use crate::llm::gateway::{
    ChunkStream, CompletionParams, LlmEmbeddings, LlmGateway, LlmGatewayResponse,
};
use crate::llm::gateways::wire;
use crate::llm::models::LlmMessage;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Default OpenAI API root
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

const BACKEND: &str = "OpenAI";

/// Configuration for connecting to OpenAI API.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenAIConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Option<Duration>,
}

impl OpenAIConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_OPENAI_URL.to_string(),
            timeout: None,
        }
    }
}

/// Gateway for OpenAI LLM service.
#[derive(Clone)]
pub struct OpenAIGateway {
    client: Client,
    config: OpenAIConfig,
}

impl OpenAIGateway {
    /// Create a new OpenAI gateway with custom configuration.
    pub fn with_config(config: OpenAIConfig) -> Result<Self> {
        let mut client_builder = Client::builder();

        if let Some(timeout) = config.timeout {
            client_builder = client_builder.timeout(timeout);
        }

        let client = client_builder.build()?;

        Ok(Self { client, config })
    }

    /// Create gateway with custom API key and base URL.
    pub fn with_api_key_and_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        Self::with_config(OpenAIConfig {
            base_url: base_url.into(),
            ..OpenAIConfig::new(api_key)
        })
    }

    fn post(&self, path: &str, body: &Value) -> RequestBuilder {
        self.client
            .post(format!("{}{}", self.config.base_url.trim_end_matches('/'), path))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(body)
    }
}

#[async_trait]
impl LlmGateway for OpenAIGateway {
    async fn complete(
        &self,
        model: &str,
        messages: &[LlmMessage],
        params: &CompletionParams,
    ) -> Result<LlmGatewayResponse> {
        info!("Delegating to OpenAI for completion");
        debug!("Model: {}, Message count: {}", model, messages.len());

        let body = wire::chat_body(model, messages, params, false, false);
        let response_body = wire::send_json(self.post("/chat/completions", &body), BACKEND).await?;

        wire::parse_chat_completion(&response_body)
    }

    fn complete_stream(
        &self,
        model: String,
        messages: Vec<LlmMessage>,
        params: CompletionParams,
        cancel: CancellationToken,
    ) -> ChunkStream {
        info!("Starting OpenAI streaming completion");
        debug!("Model: {}, Message count: {}", model, messages.len());

        let body = wire::chat_body(&model, &messages, &params, true, true);
        wire::sse_stream(self.post("/chat/completions", &body), BACKEND, cancel)
    }

    async fn calculate_embeddings(
        &self,
        model: &str,
        inputs: &[String],
    ) -> Result<LlmEmbeddings> {
        debug!("Calculating {} embeddings with model: {}", inputs.len(), model);

        if inputs.is_empty() {
            return Err(GatewayError::InvalidRequest("input must not be empty".to_string()));
        }

        let body = serde_json::json!({
            "model": model,
            "input": inputs
        });
        let response_body = wire::send_json(self.post("/embeddings", &body), BACKEND).await?;

        wire::parse_embeddings(&response_body, inputs.len())
    }
}
