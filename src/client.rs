//! Typed client for a running gateway.
//!
//! Wraps the gateway's HTTP API so consumers work with the same DTOs the server
//! emits. Gateway error bodies are mapped back onto [`GatewayError`] variants by
//! their `type` field.

use crate::error::{GatewayError, Result};
use crate::llm::gateways::lines::{sse_data, LineBuffer};
use crate::llm::models::{EmbeddingInput, LlmMessage, Usage};
use crate::llm::provider::Provider;
use crate::service::dto::{
    ChatCompletionBody, ChatCompletionChunkObject, ChatCompletionObject, EmbeddingsBody,
    EmbeddingsObject, ErrorResponse, HealthResponse, ModelsList, SwitchBody, SwitchResponse,
};
use futures::stream::{Stream, StreamExt};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::pin::Pin;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub const DEFAULT_GATEWAY_URL: &str = "http://localhost:8000";

/// Stream of content deltas from a streamed completion
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Completion as seen by a gateway consumer
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub content: String,
    pub model: String,
    pub provider: Provider,
    pub usage: Option<Usage>,
    pub finish_reason: Option<String>,
    /// Wall-clock time from request to parsed response
    pub response_time: Duration,
}

#[derive(Clone)]
pub struct GatewayClient {
    client: Client,
    base_url: String,
}

impl Default for GatewayClient {
    fn default() -> Self {
        Self::new(DEFAULT_GATEWAY_URL)
    }
}

impl GatewayClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let response = self.client.post(self.url(path)).json(body).send().await?;
        Ok(check_response(response).await?.json().await?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.client.get(self.url(path)).send().await?;
        Ok(check_response(response).await?.json().await?)
    }

    /// Send a buffered chat completion
    pub async fn chat_completion(&self, body: &ChatCompletionBody) -> Result<ChatReply> {
        let started = Instant::now();
        let body = ChatCompletionBody {
            stream: false,
            ..body.clone()
        };

        let object: ChatCompletionObject = self.post("/v1/chat/completions", &body).await?;
        let response_time = started.elapsed();
        debug!("Chat completion took {:?}", response_time);

        let choice = object
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::upstream("No choices in gateway response"))?;

        Ok(ChatReply {
            content: choice.message.content,
            model: object.model,
            provider: object.provider,
            usage: object.usage,
            finish_reason: choice.finish_reason,
            response_time,
        })
    }

    /// Single user prompt with default settings
    pub async fn prompt(&self, prompt: &str) -> Result<ChatReply> {
        let body = ChatCompletionBody::new(
            crate::service::dto::DEFAULT_CHAT_MODEL,
            vec![LlmMessage::user(prompt)],
        );
        self.chat_completion(&body).await
    }

    /// Stream content deltas.
    ///
    /// The stream ends after the gateway's end marker; an error frame from the
    /// gateway ends it with `Err`.
    pub async fn chat_completion_stream(&self, body: &ChatCompletionBody) -> Result<DeltaStream> {
        let body = ChatCompletionBody {
            stream: true,
            ..body.clone()
        };

        let response = self
            .client
            .post(self.url("/v1/chat/completions"))
            .json(&body)
            .send()
            .await?;
        let mut bytes = check_response(response).await?.bytes_stream();

        Ok(Box::pin(async_stream::stream! {
            let mut lines = LineBuffer::new();

            loop {
                let (pending, exhausted) = match bytes.next().await {
                    Some(Ok(chunk)) => (lines.push(&chunk), false),
                    Some(Err(e)) => {
                        yield Err(GatewayError::from(e));
                        return;
                    }
                    None => (lines.finish().into_iter().collect::<Vec<_>>(), true),
                };

                for line in pending {
                    let Some(data) = sse_data(&line) else {
                        continue;
                    };

                    if data == "[DONE]" {
                        return;
                    }

                    match parse_frame(data) {
                        Ok(Some(delta)) => yield Ok(delta),
                        Ok(None) => {}
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    }
                }

                if exhausted {
                    warn!("Gateway stream closed without end marker");
                    yield Err(GatewayError::upstream("stream ended without [DONE]"));
                    return;
                }
            }
        }))
    }

    /// Embed one text
    pub async fn embeddings(&self, text: &str, model: &str) -> Result<Vec<f32>> {
        let object = self.embed(EmbeddingInput::from(text), model).await?;
        object
            .into_vectors()
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::upstream("No embedding in gateway response"))
    }

    /// Embed a batch, one vector per input in input order
    pub async fn embed_batch(&self, inputs: Vec<String>, model: &str) -> Result<Vec<Vec<f32>>> {
        Ok(self.embed(EmbeddingInput::from(inputs), model).await?.into_vectors())
    }

    async fn embed(&self, input: EmbeddingInput, model: &str) -> Result<EmbeddingsObject> {
        let body = EmbeddingsBody {
            input,
            model: model.to_string(),
            provider: None,
        };
        self.post("/v1/embeddings", &body).await
    }

    pub async fn switch_provider(&self, provider: Provider) -> Result<SwitchResponse> {
        let body = SwitchBody {
            provider: Some(provider.to_string()),
        };
        self.post("/v1/provider/switch", &body).await
    }

    pub async fn list_models(&self) -> Result<ModelsList> {
        self.get("/v1/models").await
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        self.get("/").await
    }
}

/// Map a non-2xx gateway response back onto an error variant.
async fn check_response(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorResponse>(&text) {
        Ok(body) => Err(error_from_body(body)),
        Err(_) => Err(GatewayError::UpstreamFailure(format!(
            "LLM Gateway error ({}): {}",
            status, text
        ))),
    }
}

fn error_from_body(body: ErrorResponse) -> GatewayError {
    let message = body.error.message;
    let variant: fn(String) -> GatewayError = match body.error.r#type.as_str() {
        "invalid_request_error" => GatewayError::InvalidRequest,
        "invalid_provider" => GatewayError::InvalidProvider,
        "provider_not_configured" => GatewayError::ProviderNotConfigured,
        _ => GatewayError::UpstreamFailure,
    };

    // Server messages are the displayed error, prefix included.
    let prefix = variant(String::new()).to_string();
    match message.strip_prefix(&prefix) {
        Some(detail) => variant(detail.to_string()),
        None => variant(message),
    }
}

/// Content delta of one SSE payload; error payloads become `Err`.
fn parse_frame(data: &str) -> Result<Option<String>> {
    if let Ok(error) = serde_json::from_str::<ErrorResponse>(data) {
        return Err(error_from_body(error));
    }

    let chunk: ChatCompletionChunkObject = serde_json::from_str(data)?;
    Ok(chunk.delta().map(String::from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream::TryStreamExt;

    fn completion_json(content: &str) -> String {
        serde_json::json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 1_700_000_000,
            "model": "ollama/llama2",
            "provider": "local",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": content}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 3, "completion_tokens": 2, "total_tokens": 5}
        })
        .to_string()
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = GatewayClient::new("http://localhost:8000/");
        assert_eq!(client.url("/v1/models"), "http://localhost:8000/v1/models");
    }

    #[tokio::test]
    async fn test_chat_completion() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"model":"gpt-3.5-turbo","stream":false}"#.to_string(),
            ))
            .with_status(200)
            .with_body(completion_json("Hello!"))
            .create_async()
            .await;

        let reply = GatewayClient::new(server.url()).prompt("Hi").await.unwrap();

        mock.assert_async().await;
        assert_eq!(reply.content, "Hello!");
        assert_eq!(reply.model, "ollama/llama2");
        assert_eq!(reply.provider, Provider::Local);
        assert_eq!(reply.usage, Some(Usage::new(3, 2)));
        assert_eq!(reply.finish_reason, Some("stop".to_string()));
    }

    #[tokio::test]
    async fn test_error_body_maps_to_variant() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(503)
            .with_body(r#"{"error":{"message":"Provider not configured: openai","type":"provider_not_configured","code":503}}"#)
            .create_async()
            .await;

        let result = GatewayClient::new(server.url()).prompt("Hi").await;

        let err = result.unwrap_err();
        assert!(matches!(&err, GatewayError::ProviderNotConfigured(t) if t == "openai"));
        assert_eq!(err.to_string(), "Provider not configured: openai");
    }

    #[tokio::test]
    async fn test_error_message_not_doubled() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(400)
            .with_body(r#"{"error":{"message":"Invalid provider: bedrock","type":"invalid_provider","code":400}}"#)
            .create_async()
            .await;

        let err = GatewayClient::new(server.url()).prompt("Hi").await.unwrap_err();

        assert_eq!(err.to_string(), "Invalid provider: bedrock");
    }

    #[tokio::test]
    async fn test_non_json_error_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/v1/models")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let result = GatewayClient::new(server.url()).list_models().await;

        assert!(matches!(result, Err(GatewayError::UpstreamFailure(t)) if t.contains("boom")));
    }

    #[tokio::test]
    async fn test_chat_completion_stream() {
        let mut server = mockito::Server::new_async().await;
        let frame = |content: &str| {
            format!(
                "data: {}\n\n",
                serde_json::json!({
                    "id": "chatcmpl-1", "object": "chat.completion.chunk", "created": 1,
                    "model": "gpt-4", "provider": "openai",
                    "choices": [{"index": 0, "delta": {"content": content}, "finish_reason": null}]
                })
            )
        };
        let body = format!("{}{}data: [DONE]\n\n", frame("Hel"), frame("lo"));
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .match_body(mockito::Matcher::PartialJsonString(r#"{"stream":true}"#.to_string()))
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(body)
            .create_async()
            .await;

        let body = ChatCompletionBody::new("gpt-4", vec![LlmMessage::user("Hi")]);
        let stream = GatewayClient::new(server.url()).chat_completion_stream(&body).await.unwrap();
        let deltas: Vec<String> = stream.try_collect().await.unwrap();

        assert_eq!(deltas, vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn test_chat_completion_stream_error_frame() {
        let mut server = mockito::Server::new_async().await;
        let body = concat!(
            "data: {\"error\":{\"message\":\"Upstream failure: reset\",\"type\":\"upstream_error\",\"code\":502}}\n\n"
        );
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;

        let body = ChatCompletionBody::new("gpt-4", vec![LlmMessage::user("Hi")]);
        let stream = GatewayClient::new(server.url()).chat_completion_stream(&body).await.unwrap();
        let items: Vec<Result<String>> = stream.collect().await;

        assert_eq!(items.len(), 1);
        assert!(matches!(&items[0], Err(GatewayError::UpstreamFailure(t)) if t == "reset"));
    }

    #[tokio::test]
    async fn test_chat_completion_stream_truncated() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body("")
            .create_async()
            .await;

        let body = ChatCompletionBody::new("gpt-4", vec![LlmMessage::user("Hi")]);
        let stream = GatewayClient::new(server.url()).chat_completion_stream(&body).await.unwrap();
        let items: Vec<Result<String>> = stream.collect().await;

        assert_eq!(items.len(), 1);
        assert!(items[0].is_err());
    }

    #[tokio::test]
    async fn test_embed_batch() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/embeddings")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"input":["a","b"],"model":"text-embedding-ada-002"}"#.to_string(),
            ))
            .with_status(200)
            .with_body(
                r#"{"object":"list","model":"text-embedding-ada-002","provider":"openai","data":[{"object":"embedding","index":1,"embedding":[2.0]},{"object":"embedding","index":0,"embedding":[1.0]}]}"#,
            )
            .create_async()
            .await;

        let vectors = GatewayClient::new(server.url())
            .embed_batch(vec!["a".to_string(), "b".to_string()], "text-embedding-ada-002")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(vectors, vec![vec![1.0], vec![2.0]]);
    }

    #[tokio::test]
    async fn test_embeddings_single() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/embeddings")
            .match_body(mockito::Matcher::PartialJsonString(r#"{"input":"hello"}"#.to_string()))
            .with_status(200)
            .with_body(
                r#"{"object":"list","model":"ollama/nomic-embed-text","provider":"local","data":[{"object":"embedding","index":0,"embedding":[0.5,0.25]}]}"#,
            )
            .create_async()
            .await;

        let vector = GatewayClient::new(server.url())
            .embeddings("hello", "text-embedding-ada-002")
            .await
            .unwrap();

        assert_eq!(vector, vec![0.5, 0.25]);
    }

    #[tokio::test]
    async fn test_switch_provider() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/provider/switch")
            .match_body(mockito::Matcher::JsonString(r#"{"provider":"azure"}"#.to_string()))
            .with_status(200)
            .with_body(r#"{"status":"success","provider":"azure","previous":"local"}"#)
            .create_async()
            .await;

        let response = GatewayClient::new(server.url()).switch_provider(Provider::Azure).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.provider, Provider::Azure);
        assert_eq!(response.previous, Provider::Local);
    }

    #[tokio::test]
    async fn test_health() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/")
            .with_status(200)
            .with_body(r#"{"status":"healthy","service":"LLM Gateway","version":"1.0.0","default_provider":"local","providers":{"azure":false,"local":true,"openai":false}}"#)
            .create_async()
            .await;

        let health = GatewayClient::new(server.url()).health().await.unwrap();

        assert_eq!(health.status, "healthy");
        assert_eq!(health.providers.get("local"), Some(&true));
    }
}
