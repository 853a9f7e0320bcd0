use crate::error::{GatewayError, Result};
use crate::llm::gateway::{
    ChunkStream, CompletionParams, LlmEmbeddings, LlmGateway, LlmGatewayResponse, StreamChunk,
};
use crate::llm::gateways::lines::LineBuffer;
use crate::llm::gateways::wire::parse_vector;
use crate::llm::models::{LlmMessage, Usage};
use crate::llm::resolver::LOCAL_MODEL_PREFIX;
use async_trait::async_trait;
use futures::stream::StreamExt;
use reqwest::{Client, Response};
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default address of a locally running Ollama daemon
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Configuration for connecting to Ollama server
#[derive(Debug, Clone, PartialEq)]
pub struct OllamaConfig {
    pub host: String,
    pub timeout: Option<Duration>,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_OLLAMA_URL.to_string(),
            timeout: None,
        }
    }
}

/// Gateway for Ollama local LLM service
///
/// Serves chat completions through `/api/chat` (newline-delimited JSON when streaming)
/// and batched embeddings through `/api/embed`.
#[derive(Clone)]
pub struct OllamaGateway {
    client: Client,
    config: OllamaConfig,
}

impl OllamaGateway {
    /// Create a new Ollama gateway with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(OllamaConfig::default())
    }

    /// Create a new Ollama gateway with custom configuration
    pub fn with_config(config: OllamaConfig) -> Result<Self> {
        let mut client_builder = Client::builder();

        if let Some(timeout) = config.timeout {
            client_builder = client_builder.timeout(timeout);
        }

        let client = client_builder.build()?;

        Ok(Self { client, config })
    }

    /// Create gateway with custom host
    pub fn with_host(host: impl Into<String>) -> Result<Self> {
        Self::with_config(OllamaConfig {
            host: host.into(),
            ..Default::default()
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.host.trim_end_matches('/'), path)
    }

    /// List models installed in the local runtime
    pub async fn list_models(&self) -> Result<Vec<String>> {
        debug!("Fetching installed Ollama models");

        let response = self
            .client
            .get(self.url("/api/tags"))
            .send()
            .await
            .map_err(GatewayError::upstream)?;
        let body: Value = check_status(response).await?.json().await.map_err(GatewayError::upstream)?;

        let models = body["models"]
            .as_array()
            .ok_or_else(|| GatewayError::upstream("Invalid response format from /api/tags"))?
            .iter()
            .filter_map(|m| m["name"].as_str().map(String::from))
            .collect();

        Ok(models)
    }
}

#[async_trait]
impl LlmGateway for OllamaGateway {
    async fn complete(
        &self,
        model: &str,
        messages: &[LlmMessage],
        params: &CompletionParams,
    ) -> Result<LlmGatewayResponse> {
        info!("Delegating to Ollama for completion");
        debug!("Model: {}, Message count: {}", model, messages.len());

        let body = chat_body(model, messages, params, false);

        let response = self
            .client
            .post(self.url("/api/chat"))
            .json(&body)
            .send()
            .await
            .map_err(GatewayError::upstream)?;

        let response_body: Value =
            check_status(response).await?.json().await.map_err(GatewayError::upstream)?;

        if let Some(error) = response_body["error"].as_str() {
            return Err(GatewayError::upstream(error));
        }

        let content = response_body["message"]["content"]
            .as_str()
            .ok_or_else(|| GatewayError::upstream("No content in Ollama response"))?
            .to_string();

        Ok(LlmGatewayResponse {
            content,
            usage: parse_usage(&response_body),
            finish_reason: response_body["done_reason"].as_str().map(String::from),
        })
    }

    fn complete_stream(
        &self,
        model: String,
        messages: Vec<LlmMessage>,
        params: CompletionParams,
        cancel: CancellationToken,
    ) -> ChunkStream {
        let gateway = self.clone();

        Box::pin(async_stream::stream! {
            info!("Starting Ollama streaming completion");
            debug!("Model: {}, Message count: {}", model, messages.len());

            let body = chat_body(&model, &messages, &params, true);
            let request = gateway.client.post(gateway.url("/api/chat")).json(&body).send();

            let sent = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                result = request => Some(result),
            };

            let response = match sent {
                Some(Ok(r)) => r,
                Some(Err(e)) => {
                    yield Err(GatewayError::upstream(e));
                    return;
                }
                None => {
                    debug!("Ollama stream cancelled before response");
                    return;
                }
            };

            let response = match check_status(response).await {
                Ok(r) => r,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            // Process newline-delimited JSON
            let mut stream = response.bytes_stream();
            let mut lines = LineBuffer::new();

            loop {
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    next = stream.next() => Some(next),
                };
                let Some(next) = next else {
                    debug!("Ollama stream cancelled by caller");
                    return;
                };

                let (pending, exhausted) = match next {
                    Some(Ok(bytes)) => (lines.push(&bytes), false),
                    Some(Err(e)) => {
                        yield Err(GatewayError::upstream(e));
                        return;
                    }
                    None => (lines.finish().into_iter().collect::<Vec<_>>(), true),
                };

                for line in pending {
                    match parse_stream_line(&line) {
                        Ok(Some(chunk)) => yield Ok(chunk),
                        Ok(None) => {}
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    }
                }

                if exhausted {
                    break;
                }
            }
        })
    }

    async fn calculate_embeddings(
        &self,
        model: &str,
        inputs: &[String],
    ) -> Result<LlmEmbeddings> {
        let model = native_model(model);
        debug!("Calculating {} embeddings with model: {}", inputs.len(), model);

        let body = serde_json::json!({
            "model": model,
            "input": inputs
        });

        let response = self
            .client
            .post(self.url("/api/embed"))
            .json(&body)
            .send()
            .await
            .map_err(GatewayError::upstream)?;

        let response_body: Value =
            check_status(response).await?.json().await.map_err(GatewayError::upstream)?;

        // /api/embed returns embeddings in the order of `input`
        let vectors = response_body["embeddings"]
            .as_array()
            .ok_or_else(|| GatewayError::upstream("Invalid embeddings response"))?
            .iter()
            .map(parse_vector)
            .collect::<Result<Vec<_>>>()?;

        if vectors.len() != inputs.len() {
            return Err(GatewayError::upstream(format!(
                "Ollama returned {} embeddings for {} inputs",
                vectors.len(),
                inputs.len()
            )));
        }

        let usage = response_body["prompt_eval_count"]
            .as_u64()
            .map(|prompt| Usage::new(prompt as u32, 0));

        Ok(LlmEmbeddings { vectors, usage })
    }

    async fn is_available(&self) -> bool {
        match self.client.get(self.url("/api/version")).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("Ollama version probe failed: {}", e);
                false
            }
        }
    }
}

/// Strip the gateway's `ollama/` namespace; the daemon only knows bare names.
fn native_model(model: &str) -> &str {
    model.strip_prefix(LOCAL_MODEL_PREFIX).unwrap_or(model)
}

fn chat_body(
    model: &str,
    messages: &[LlmMessage],
    params: &CompletionParams,
    stream: bool,
) -> Value {
    serde_json::json!({
        "model": native_model(model),
        "messages": adapt_messages_to_ollama(messages),
        "options": extract_ollama_options(params),
        "stream": stream
    })
}

// Message adapter for Ollama format
fn adapt_messages_to_ollama(messages: &[LlmMessage]) -> Vec<Value> {
    messages
        .iter()
        .map(|msg| {
            serde_json::json!({
                "role": msg.role.as_str(),
                "content": msg.content
            })
        })
        .collect()
}

// Extract Ollama-specific options from params
fn extract_ollama_options(params: &CompletionParams) -> Value {
    let mut options = serde_json::json!({
        "temperature": params.temperature,
    });

    if let Some(max_tokens) = params.max_tokens {
        options["num_predict"] = serde_json::json!(max_tokens);
    }

    options
}

fn parse_usage(body: &Value) -> Option<Usage> {
    let prompt = body["prompt_eval_count"].as_u64()?;
    let completion = body["eval_count"].as_u64().unwrap_or(0);
    Some(Usage::new(prompt as u32, completion as u32))
}

/// Turn one NDJSON line into a chunk.
///
/// A line that is not JSON or that carries an `error` field ends the stream.
fn parse_stream_line(line: &str) -> Result<Option<StreamChunk>> {
    let json: Value = serde_json::from_str(line).map_err(|e| {
        warn!("Failed to parse streaming chunk: {}", e);
        GatewayError::upstream(format!("malformed stream payload: {}: {}", e, line))
    })?;

    if let Some(error) = json["error"].as_str() {
        return Err(GatewayError::upstream(error));
    }

    let content = json["message"]["content"].as_str().unwrap_or_default().to_string();

    if json["done"].as_bool().unwrap_or(false) {
        return Ok(Some(StreamChunk {
            content,
            finish_reason: Some(json["done_reason"].as_str().unwrap_or("stop").to_string()),
            usage: parse_usage(&json),
        }));
    }

    if content.is_empty() {
        return Ok(None);
    }

    Ok(Some(StreamChunk::content(content)))
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_text = response.text().await.unwrap_or_default();
    Err(GatewayError::UpstreamFailure(format!("Ollama API error: {} - {}", status, error_text)))
}
