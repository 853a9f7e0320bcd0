use crate::error::{GatewayError, Result};
use crate::llm::models::{EmbeddingRequest, EmbeddingResponse};
use crate::llm::registry::ProviderRegistry;
use crate::router::{select, GatewayTable};
use std::sync::Arc;
use tracing::{error, info};

/// Routes embedding requests; always non-streaming, one dispatch per request.
#[derive(Clone)]
pub struct EmbeddingRouter {
    registry: Arc<ProviderRegistry>,
    gateways: Arc<GatewayTable>,
}

impl EmbeddingRouter {
    pub fn new(registry: Arc<ProviderRegistry>, gateways: Arc<GatewayTable>) -> Self {
        Self { registry, gateways }
    }

    /// Embed every input, returning vectors in input order
    pub async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse> {
        if request.inputs.is_empty() {
            return Err(GatewayError::InvalidRequest("input must not be empty".to_string()));
        }

        let dispatch = select(&self.registry, &self.gateways, request.provider, &request.model)?;
        info!(
            provider = %dispatch.provider,
            model = %dispatch.model,
            inputs = request.inputs.len(),
            "Routing embeddings"
        );

        let embeddings = dispatch
            .gateway
            .calculate_embeddings(&dispatch.model, &request.inputs)
            .await
            .inspect_err(|e| error!(provider = %dispatch.provider, "Embedding failed: {}", e))?;

        if embeddings.vectors.len() != request.inputs.len() {
            return Err(GatewayError::upstream(format!(
                "{} returned {} vectors for {} inputs",
                dispatch.provider,
                embeddings.vectors.len(),
                request.inputs.len()
            )));
        }

        Ok(EmbeddingResponse {
            provider: dispatch.provider,
            model: dispatch.model,
            embeddings: embeddings.vectors,
            usage: embeddings.usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::gateway::{ChunkStream, CompletionParams, LlmEmbeddings, LlmGateway, LlmGatewayResponse};
    use crate::llm::gateways::{OllamaConfig, OpenAIConfig};
    use crate::llm::models::LlmMessage;
    use crate::llm::provider::Provider;
    use crate::llm::registry::ProviderConfig;
    use crate::router::testing::StubGateway;
    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    fn inputs(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn local_router(gateway: Arc<dyn LlmGateway>) -> EmbeddingRouter {
        let registry = Arc::new(ProviderRegistry::new(
            Provider::Local,
            [ProviderConfig::Local(OllamaConfig::default())],
        ));
        EmbeddingRouter::new(registry, Arc::new(GatewayTable::new().with_gateway(Provider::Local, gateway)))
    }

    #[tokio::test]
    async fn test_three_inputs_three_vectors_in_order() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/embed")
            .match_body(mockito::Matcher::JsonString(
                r#"{"model":"nomic-embed-text","input":["one","two","three"]}"#.to_string(),
            ))
            .with_status(200)
            .with_body(r#"{"model":"nomic-embed-text","embeddings":[[0.1,0.1],[0.2,0.2],[0.3,0.3]]}"#)
            .create_async()
            .await;

        let registry = Arc::new(ProviderRegistry::new(
            Provider::Local,
            [ProviderConfig::Local(OllamaConfig {
                host: server.url(),
                timeout: None,
            })],
        ));
        let table = GatewayTable::from_registry(&registry).unwrap();
        let router = EmbeddingRouter::new(registry, Arc::new(table));

        let response = router
            .embed(EmbeddingRequest::new("text-embedding-ada-002", inputs(&["one", "two", "three"])))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.provider, Provider::Local);
        assert_eq!(response.model, "ollama/nomic-embed-text");
        assert_eq!(
            response.embeddings,
            vec![vec![0.1, 0.1], vec![0.2, 0.2], vec![0.3, 0.3]]
        );
    }

    #[tokio::test]
    async fn test_hosted_vectors_follow_input_order() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/embeddings")
            .with_status(200)
            .with_body(
                r#"{"data":[{"index":2,"embedding":[3.0]},{"index":0,"embedding":[1.0]},{"index":1,"embedding":[2.0]}],"usage":{"prompt_tokens":6,"total_tokens":6}}"#,
            )
            .create_async()
            .await;

        let registry = Arc::new(ProviderRegistry::new(
            Provider::OpenAI,
            [ProviderConfig::OpenAI(OpenAIConfig {
                base_url: server.url(),
                ..OpenAIConfig::new("sk-test")
            })],
        ));
        let table = GatewayTable::from_registry(&registry).unwrap();
        let router = EmbeddingRouter::new(registry, Arc::new(table));

        let response = router
            .embed(EmbeddingRequest::new("text-embedding-ada-002", inputs(&["a", "b", "c"])))
            .await
            .unwrap();

        assert_eq!(response.embeddings, vec![vec![1.0], vec![2.0], vec![3.0]]);
        assert_eq!(response.usage.map(|u| u.prompt_tokens), Some(6));
    }

    #[tokio::test]
    async fn test_empty_inputs_rejected() {
        let router = local_router(Arc::new(StubGateway::default()));

        let result = router.embed(EmbeddingRequest::new("text-embedding-ada-002", vec![])).await;

        assert!(matches!(result, Err(GatewayError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_unconfigured_provider() {
        let router = local_router(Arc::new(StubGateway::default()));

        let result = router
            .embed(EmbeddingRequest::new("text-embedding-ada-002", inputs(&["x"])).with_provider(Provider::Azure))
            .await;

        assert!(matches!(result, Err(GatewayError::ProviderNotConfigured(_))));
    }

    #[tokio::test]
    async fn test_upstream_failure() {
        let router = local_router(Arc::new(StubGateway::failing("model not found")));

        let result = router.embed(EmbeddingRequest::new("text-embedding-ada-002", inputs(&["x"]))).await;

        assert!(matches!(result, Err(GatewayError::UpstreamFailure(t)) if t == "model not found"));
    }

    struct ShortGateway;

    #[async_trait]
    impl LlmGateway for ShortGateway {
        async fn complete(
            &self,
            _model: &str,
            _messages: &[LlmMessage],
            _params: &CompletionParams,
        ) -> crate::error::Result<LlmGatewayResponse> {
            Ok(LlmGatewayResponse::default())
        }

        fn complete_stream(
            &self,
            _model: String,
            _messages: Vec<LlmMessage>,
            _params: CompletionParams,
            _cancel: CancellationToken,
        ) -> ChunkStream {
            Box::pin(futures::stream::empty())
        }

        async fn calculate_embeddings(
            &self,
            _model: &str,
            _inputs: &[String],
        ) -> crate::error::Result<LlmEmbeddings> {
            Ok(LlmEmbeddings {
                vectors: vec![vec![1.0]],
                usage: None,
            })
        }
    }

    #[tokio::test]
    async fn test_vector_count_mismatch_is_upstream_failure() {
        let router = local_router(Arc::new(ShortGateway));

        let result = router
            .embed(EmbeddingRequest::new("text-embedding-ada-002", inputs(&["a", "b"])))
            .await;

        assert!(matches!(result, Err(GatewayError::UpstreamFailure(t)) if t.contains("1 vectors for 2 inputs")));
    }
}
