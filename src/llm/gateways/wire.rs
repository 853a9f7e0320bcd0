//! OpenAI chat/embeddings wire protocol.
//!
//! OpenAI and Azure OpenAI speak the same request and response bodies and differ only
//! in URL layout and authentication, so both gateways build and parse through here.

use crate::error::{GatewayError, Result};
use crate::llm::gateway::{ChunkStream, CompletionParams, LlmEmbeddings, LlmGatewayResponse, StreamChunk};
use crate::llm::gateways::lines::{sse_data, LineBuffer};
use crate::llm::models::{LlmMessage, Usage};
use futures::stream::StreamExt;
use reqwest::{RequestBuilder, Response};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Build a chat completion body.
pub fn chat_body(
    model: &str,
    messages: &[LlmMessage],
    params: &CompletionParams,
    stream: bool,
    include_usage: bool,
) -> Value {
    let mut body = serde_json::json!({
        "model": model,
        "messages": adapt_messages_to_openai(messages),
        "temperature": params.temperature,
    });

    if let Some(max_tokens) = params.max_tokens {
        body["max_tokens"] = serde_json::json!(max_tokens);
    }

    if stream {
        body["stream"] = serde_json::json!(true);
        if include_usage {
            body["stream_options"] = serde_json::json!({ "include_usage": true });
        }
    }

    body
}

fn adapt_messages_to_openai(messages: &[LlmMessage]) -> Vec<Value> {
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

pub fn parse_usage(value: &Value) -> Option<Usage> {
    if value.is_null() {
        return None;
    }
    serde_json::from_value(value.clone()).ok()
}

/// Parse a non-streaming `chat.completion` object.
pub fn parse_chat_completion(body: &Value) -> Result<LlmGatewayResponse> {
    let choice = &body["choices"][0];
    if choice.is_null() {
        return Err(GatewayError::upstream(format!("No choices in response: {}", body)));
    }

    Ok(LlmGatewayResponse {
        content: choice["message"]["content"].as_str().unwrap_or_default().to_string(),
        usage: parse_usage(&body["usage"]),
        finish_reason: choice["finish_reason"].as_str().map(String::from),
    })
}

/// Parse the payload of one SSE `data:` line.
///
/// Returns `Ok(None)` for payloads that carry nothing worth forwarding. A payload that
/// is not JSON fails the stream.
pub fn parse_stream_event(data: &str) -> Result<Option<StreamChunk>> {
    let json: Value = serde_json::from_str(data).map_err(|e| {
        warn!("Failed to parse streaming chunk: {}", e);
        GatewayError::upstream(format!("malformed stream payload: {}: {}", e, data))
    })?;

    if !json["error"].is_null() {
        let message = json["error"]["message"]
            .as_str()
            .map(String::from)
            .unwrap_or_else(|| json["error"].to_string());
        return Err(GatewayError::UpstreamFailure(message));
    }

    let usage = parse_usage(&json["usage"]);
    let choice = json["choices"].as_array().and_then(|c| c.first());

    let (content, finish_reason) = match choice {
        Some(choice) => (
            choice["delta"]["content"].as_str().unwrap_or_default().to_string(),
            choice["finish_reason"].as_str().map(String::from),
        ),
        None => (String::new(), None),
    };

    if content.is_empty() && finish_reason.is_none() && usage.is_none() {
        return Ok(None);
    }

    Ok(Some(StreamChunk {
        content,
        finish_reason,
        usage,
    }))
}

/// Parse an embeddings list, ordering vectors by their reported `index`.
pub fn parse_embeddings(body: &Value, expected: usize) -> Result<LlmEmbeddings> {
    let data = body["data"]
        .as_array()
        .ok_or_else(|| GatewayError::upstream("Invalid embeddings response"))?;

    if data.len() != expected {
        return Err(GatewayError::upstream(format!(
            "Received {} embeddings for {} inputs",
            data.len(),
            expected
        )));
    }

    let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
    for (position, item) in data.iter().enumerate() {
        let index = item["index"].as_u64().map(|i| i as usize).unwrap_or(position);
        let slot = slots.get_mut(index).ok_or_else(|| {
            GatewayError::upstream(format!("Embedding index {} out of range", index))
        })?;
        if slot.is_some() {
            return Err(GatewayError::upstream(format!("Duplicate embedding index {}", index)));
        }

        *slot = Some(parse_vector(&item["embedding"])?);
    }

    let vectors = slots.into_iter().flatten().collect();

    Ok(LlmEmbeddings {
        vectors,
        usage: parse_usage(&body["usage"]),
    })
}

/// Read one embedding vector, rejecting non-numeric components.
pub fn parse_vector(value: &Value) -> Result<Vec<f32>> {
    value
        .as_array()
        .ok_or_else(|| GatewayError::upstream("Embedding is not an array"))?
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| GatewayError::upstream("Embedding contains a non-numeric value"))
        })
        .collect()
}

/// Fail with the backend's status and body text on a non-2xx response.
pub async fn check_status(response: Response, backend: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_text = response.text().await.unwrap_or_default();
    Err(GatewayError::UpstreamFailure(format!("{} API error: {} - {}", backend, status, error_text)))
}

/// Send a JSON request and decode the JSON response.
pub async fn send_json(request: RequestBuilder, backend: &str) -> Result<Value> {
    let response = request.send().await.map_err(GatewayError::upstream)?;
    check_status(response, backend).await?.json().await.map_err(GatewayError::upstream)
}

/// Send a streaming request and decode its SSE body into chunks.
pub fn sse_stream(
    request: RequestBuilder,
    backend: &'static str,
    cancel: CancellationToken,
) -> ChunkStream {
    Box::pin(async_stream::stream! {
        let sent = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = request.send() => Some(result),
        };

        let response = match sent {
            Some(Ok(r)) => r,
            Some(Err(e)) => {
                yield Err(GatewayError::upstream(e));
                return;
            }
            None => {
                debug!("{} stream cancelled before response", backend);
                return;
            }
        };

        let response = match check_status(response, backend).await {
            Ok(r) => r,
            Err(e) => {
                yield Err(e);
                return;
            }
        };

        let mut stream = response.bytes_stream();
        let mut lines = LineBuffer::new();

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                next = stream.next() => Some(next),
            };
            let Some(next) = next else {
                debug!("{} stream cancelled by caller", backend);
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
                let Some(data) = sse_data(&line) else {
                    continue;
                };

                if data == "[DONE]" {
                    return;
                }

                match parse_stream_event(data) {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_body_non_streaming() {
        let params = CompletionParams {
            temperature: 0.3,
            max_tokens: Some(256),
        };
        let body = chat_body("gpt-4", &[LlmMessage::user("Hi")], &params, false, true);

        assert_eq!(body["model"], "gpt-4");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["max_tokens"], 256);
        assert!(body.get("stream").is_none());
        assert!(body.get("stream_options").is_none());
    }

    #[test]
    fn test_chat_body_streaming_with_usage() {
        let body = chat_body("gpt-4", &[], &CompletionParams::default(), true, true);

        assert_eq!(body["stream"], true);
        assert_eq!(body["stream_options"]["include_usage"], true);
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn test_chat_body_streaming_without_usage() {
        let body = chat_body("gpt-4", &[], &CompletionParams::default(), true, false);
        assert!(body.get("stream_options").is_none());
    }

    #[test]
    fn test_parse_chat_completion() {
        let body = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "Hello!"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 9, "completion_tokens": 3, "total_tokens": 12}
        });

        let response = parse_chat_completion(&body).unwrap();
        assert_eq!(response.content, "Hello!");
        assert_eq!(response.finish_reason, Some("stop".to_string()));
        assert_eq!(response.usage, Some(Usage::new(9, 3)));
    }

    #[test]
    fn test_parse_chat_completion_without_choices() {
        let body = serde_json::json!({"object": "chat.completion"});
        assert!(matches!(parse_chat_completion(&body), Err(GatewayError::UpstreamFailure(_))));
    }

    #[test]
    fn test_parse_stream_event_delta() {
        let chunk = parse_stream_event(r#"{"choices":[{"index":0,"delta":{"content":"Hi"},"finish_reason":null}]}"#)
            .unwrap()
            .unwrap();
        assert_eq!(chunk.content, "Hi");
        assert!(chunk.finish_reason.is_none());
    }

    #[test]
    fn test_parse_stream_event_role_only_is_skipped() {
        let chunk =
            parse_stream_event(r#"{"choices":[{"index":0,"delta":{"role":"assistant"}}]}"#).unwrap();
        assert!(chunk.is_none());
    }

    #[test]
    fn test_parse_stream_event_usage_only() {
        let chunk = parse_stream_event(
            r#"{"choices":[],"usage":{"prompt_tokens":1,"completion_tokens":2,"total_tokens":3}}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(chunk.content, "");
        assert_eq!(chunk.usage, Some(Usage::new(1, 2)));
    }

    #[test]
    fn test_parse_stream_event_error() {
        let err = parse_stream_event(r#"{"error":{"message":"overloaded","type":"server_error"}}"#)
            .unwrap_err();
        assert_eq!(err.to_string(), "Upstream failure: overloaded");
    }

    #[test]
    fn test_parse_stream_event_rejects_malformed_json() {
        let err = parse_stream_event("{garbage").unwrap_err();
        assert!(matches!(&err, GatewayError::UpstreamFailure(t) if t.contains("{garbage")));
    }

    #[test]
    fn test_parse_embeddings_reorders_by_index() {
        let body = serde_json::json!({
            "data": [
                {"index": 2, "embedding": [3.0]},
                {"index": 0, "embedding": [1.0]},
                {"index": 1, "embedding": [2.0]}
            ],
            "usage": {"prompt_tokens": 3, "total_tokens": 3}
        });

        let result = parse_embeddings(&body, 3).unwrap();
        assert_eq!(result.vectors, vec![vec![1.0], vec![2.0], vec![3.0]]);
        assert_eq!(result.usage, Some(Usage::new(3, 0)));
    }

    #[test]
    fn test_parse_embeddings_without_index_keeps_position() {
        let body = serde_json::json!({"data": [{"embedding": [0.5]}, {"embedding": [0.25]}]});

        let result = parse_embeddings(&body, 2).unwrap();
        assert_eq!(result.vectors, vec![vec![0.5], vec![0.25]]);
    }

    #[test]
    fn test_parse_embeddings_count_mismatch() {
        let body = serde_json::json!({"data": [{"index": 0, "embedding": [0.5]}]});
        assert!(parse_embeddings(&body, 2).is_err());
    }

    #[test]
    fn test_parse_embeddings_rejects_non_numeric_component() {
        let body = serde_json::json!({"data": [{"index": 0, "embedding": [0.5, "x", 0.25]}]});

        let err = parse_embeddings(&body, 1).unwrap_err();
        assert!(matches!(&err, GatewayError::UpstreamFailure(t) if t.contains("non-numeric")));
    }

    #[test]
    fn test_parse_embeddings_duplicate_index() {
        let body = serde_json::json!({
            "data": [{"index": 0, "embedding": [0.5]}, {"index": 0, "embedding": [0.6]}]
        });
        assert!(parse_embeddings(&body, 2).is_err());
    }

    #[test]
    fn test_parse_embeddings_index_out_of_range() {
        let body = serde_json::json!({"data": [{"index": 5, "embedding": [0.5]}]});
        assert!(parse_embeddings(&body, 1).is_err());
    }
}
