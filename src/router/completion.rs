use crate::error::Result;
use crate::llm::gateway::CompletionParams;
use crate::llm::models::{CompletionRequest, CompletionResponse};
use crate::llm::registry::ProviderRegistry;
use crate::router::stream::CompletionStream;
use crate::router::{select, GatewayTable};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Result of routing a completion request
pub enum CompletionOutcome {
    Complete(CompletionResponse),
    Stream(CompletionStream),
}

/// Routes chat completions to the selected provider's gateway.
///
/// No retries and no failover: a failing provider surfaces its error verbatim.
#[derive(Clone)]
pub struct CompletionRouter {
    registry: Arc<ProviderRegistry>,
    gateways: Arc<GatewayTable>,
}

impl CompletionRouter {
    pub fn new(registry: Arc<ProviderRegistry>, gateways: Arc<GatewayTable>) -> Self {
        Self { registry, gateways }
    }

    /// Route a request, buffered or streaming according to `request.stream`
    pub async fn route(&self, request: CompletionRequest) -> Result<CompletionOutcome> {
        if request.stream {
            self.stream(request).map(CompletionOutcome::Stream)
        } else {
            self.complete(request).await.map(CompletionOutcome::Complete)
        }
    }

    /// Wait for the whole completion
    pub async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let dispatch = select(&self.registry, &self.gateways, request.provider, &request.model)?;
        info!(provider = %dispatch.provider, model = %dispatch.model, "Routing completion");

        let params = CompletionParams {
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = dispatch
            .gateway
            .complete(&dispatch.model, &request.messages, &params)
            .await
            .inspect_err(|e| error!(provider = %dispatch.provider, "Completion failed: {}", e))?;

        Ok(CompletionResponse {
            model: dispatch.model,
            provider: dispatch.provider,
            content: response.content,
            usage: response.usage,
            finish_reason: response.finish_reason,
        })
    }

    /// Open a lazy completion stream.
    ///
    /// Selection errors are returned here; backend errors arrive inside the stream.
    pub fn stream(&self, request: CompletionRequest) -> Result<CompletionStream> {
        let dispatch = select(&self.registry, &self.gateways, request.provider, &request.model)?;
        info!(provider = %dispatch.provider, model = %dispatch.model, "Routing streaming completion");

        let params = CompletionParams {
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };
        let cancel = CancellationToken::new();

        let inner = dispatch.gateway.complete_stream(
            dispatch.model.clone(),
            request.messages,
            params,
            cancel.clone(),
        );

        Ok(CompletionStream::new(inner, dispatch.model, dispatch.provider, cancel))
    }
}
