//! Azure OpenAI Gateway.
//!
//! Azure serves OpenAI models from per-resource deployments:
//! `{endpoint}/openai/deployments/{deployment}/{operation}?api-version={version}`,
//! authenticated with an `api-key` header. Native model ids carry an `azure/`
//! namespace which is stripped to obtain the deployment name.

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

pub const DEFAULT_AZURE_API_VERSION: &str = "2024-02-15-preview";

const BACKEND: &str = "Azure OpenAI";
const DEPLOYMENT_PREFIX: &str = "azure/";

/// Configuration for an Azure OpenAI resource.
#[derive(Debug, Clone, PartialEq)]
pub struct AzureConfig {
    pub endpoint: String,
    pub api_key: String,
    pub api_version: String,
    pub timeout: Option<Duration>,
}

impl AzureConfig {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            api_version: DEFAULT_AZURE_API_VERSION.to_string(),
            timeout: None,
        }
    }
}

/// Gateway for Azure OpenAI deployments.
#[derive(Clone)]
pub struct AzureGateway {
    client: Client,
    config: AzureConfig,
}

impl AzureGateway {
    pub fn with_config(config: AzureConfig) -> Result<Self> {
        let mut client_builder = Client::builder();

        if let Some(timeout) = config.timeout {
            client_builder = client_builder.timeout(timeout);
        }

        let client = client_builder.build()?;

        Ok(Self { client, config })
    }

    fn deployment_url(&self, model: &str, operation: &str) -> String {
        format!(
            "{}/openai/deployments/{}/{}?api-version={}",
            self.config.endpoint.trim_end_matches('/'),
            deployment_name(model),
            operation,
            self.config.api_version
        )
    }

    fn post(&self, model: &str, operation: &str, body: &Value) -> RequestBuilder {
        self.client
            .post(self.deployment_url(model, operation))
            .header("api-key", &self.config.api_key)
            .header("Content-Type", "application/json")
            .json(body)
    }
}

/// Deployment name for a native model id.
fn deployment_name(model: &str) -> &str {
    model.strip_prefix(DEPLOYMENT_PREFIX).unwrap_or(model)
}

#[async_trait]
impl LlmGateway for AzureGateway {
    async fn complete(
        &self,
        model: &str,
        messages: &[LlmMessage],
        params: &CompletionParams,
    ) -> Result<LlmGatewayResponse> {
        info!("Delegating to Azure OpenAI for completion");
        debug!("Deployment: {}, Message count: {}", deployment_name(model), messages.len());

        // Azure routes on the deployment in the URL; the body model field is informational
        let body = wire::chat_body(deployment_name(model), messages, params, false, false);
        let request = self.post(model, "chat/completions", &body);
        let response_body = wire::send_json(request, BACKEND).await?;

        wire::parse_chat_completion(&response_body)
    }

    fn complete_stream(
        &self,
        model: String,
        messages: Vec<LlmMessage>,
        params: CompletionParams,
        cancel: CancellationToken,
    ) -> ChunkStream {
        info!("Starting Azure OpenAI streaming completion");
        debug!("Deployment: {}, Message count: {}", deployment_name(&model), messages.len());

        let body = wire::chat_body(deployment_name(&model), &messages, &params, true, false);
        wire::sse_stream(self.post(&model, "chat/completions", &body), BACKEND, cancel)
    }

    async fn calculate_embeddings(
        &self,
        model: &str,
        inputs: &[String],
    ) -> Result<LlmEmbeddings> {
        debug!("Calculating {} embeddings with deployment: {}", inputs.len(), deployment_name(model));

        if inputs.is_empty() {
            return Err(GatewayError::InvalidRequest("input must not be empty".to_string()));
        }

        let body = serde_json::json!({ "input": inputs });
        let response_body = wire::send_json(self.post(model, "embeddings", &body), BACKEND).await?;

        wire::parse_embeddings(&response_body, inputs.len())
    }
}
