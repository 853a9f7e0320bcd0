//! HTTP boundary of the gateway.
//!
//! This module builds the axum router over the completion and embedding routers
//! and provides the `serve()` function that runs it on a pre-bound listener until
//! the cancellation token fires.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod sse;

use crate::config::{CorsConfig, GatewayConfig};
use crate::error::Result;
use crate::llm::registry::ProviderRegistry;
use crate::router::{CompletionRouter, EmbeddingRouter, GatewayTable};
use axum::http::request::Parts;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application state for the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ProviderRegistry>,
    pub gateways: Arc<GatewayTable>,
    pub completions: CompletionRouter,
    pub embeddings: EmbeddingRouter,
}

impl AppState {
    pub fn new(registry: Arc<ProviderRegistry>, gateways: Arc<GatewayTable>) -> Self {
        Self {
            completions: CompletionRouter::new(Arc::clone(&registry), Arc::clone(&gateways)),
            embeddings: EmbeddingRouter::new(Arc::clone(&registry), Arc::clone(&gateways)),
            registry,
            gateways,
        }
    }

    /// Build the registry and one gateway per configured provider.
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        let registry = Arc::new(ProviderRegistry::from_config(config));
        let gateways = Arc::new(GatewayTable::from_registry(&registry)?);
        Ok(Self::new(registry, gateways))
    }
}

/// Build CORS layer from configuration.
fn build_cors_layer(config: &CorsConfig) -> CorsLayer {
    match config {
        CorsConfig::AllowAll => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
        CorsConfig::AllowOrigins(_) => {
            let config = config.clone();
            CorsLayer::new()
                .allow_origin(AllowOrigin::predicate(
                    move |origin: &HeaderValue, _: &Parts| {
                        origin.to_str().is_ok_and(|o| config.allows(o))
                    },
                ))
                .allow_methods(Any)
                .allow_headers(Any)
        }
    }
}

/// Create the gateway router.
pub fn create_router(state: AppState, cors: &CorsConfig) -> Router {
    Router::new()
        .route("/", get(handlers::health))
        .route("/v1/chat/completions", post(handlers::chat_completions))
        .route("/v1/embeddings", post(handlers::embeddings))
        .route("/v1/models", get(handlers::list_models))
        .route("/v1/provider", get(handlers::provider_status))
        .route("/v1/provider/switch", post(handlers::switch_provider))
        .with_state(state)
        .layer(build_cors_layer(cors))
        .layer(TraceLayer::new_for_http())
}

/// Run the gateway on a pre-bound listener until `cancel` fires.
pub async fn serve(listener: TcpListener, app: Router, cancel: CancellationToken) -> Result<()> {
    let addr = listener.local_addr()?;
    info!("LLM Gateway listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await?;

    info!("LLM Gateway shut down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::gateways::OllamaConfig;
    use crate::llm::provider::Provider;
    use crate::llm::registry::ProviderConfig;
    use crate::router::testing::StubGateway;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn app(gateway: StubGateway) -> (Router, Arc<ProviderRegistry>) {
        let registry = Arc::new(ProviderRegistry::new(
            Provider::Local,
            [ProviderConfig::Local(OllamaConfig::default())],
        ));
        let gateways = Arc::new(GatewayTable::new().with_gateway(Provider::Local, Arc::new(gateway)));
        let state = AppState::new(Arc::clone(&registry), gateways);
        (create_router(state, &CorsConfig::AllowAll), registry)
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_chat_completion_buffered() {
        let (app, _) = app(StubGateway::replying("Hello from stub"));

        let response = app
            .oneshot(post_json(
                "/v1/chat/completions",
                r#"{"model":"gpt-3.5-turbo","messages":[{"role":"user","content":"Hi"}]}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["model"], "ollama/llama2");
        assert_eq!(json["provider"], "local");
        assert_eq!(json["choices"][0]["message"]["content"], "Hello from stub");
    }

    #[tokio::test]
    async fn test_chat_completion_stream_frames() {
        let (app, _) = app(StubGateway::streaming(&["Hel", "lo"]));

        let response = app
            .oneshot(post_json(
                "/v1/chat/completions",
                r#"{"messages":[{"role":"user","content":"Hi"}],"stream":true}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "text/event-stream");

        let text = body_text(response).await;
        let frames: Vec<&str> = text.split_terminator("\n\n").collect();
        assert_eq!(frames.len(), 3);
        assert!(frames[0].contains("\"content\":\"Hel\""));
        assert_eq!(frames[2], "data: [DONE]");
        assert_eq!(text.matches("[DONE]").count(), 1);
    }

    #[tokio::test]
    async fn test_chat_completion_upstream_failure_is_502() {
        let (app, _) = app(StubGateway::failing("model 'llama2' not found"));

        let response = app
            .oneshot(post_json(
                "/v1/chat/completions",
                r#"{"messages":[{"role":"user","content":"Hi"}]}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(body_text(response).await.contains("model 'llama2' not found"));
    }

    #[tokio::test]
    async fn test_malformed_json_is_400() {
        let (app, _) = app(StubGateway::default());

        let response = app
            .oneshot(post_json("/v1/chat/completions", "{not json"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_embeddings_single_input() {
        let (app, _) = app(StubGateway::default());

        let response = app
            .oneshot(post_json("/v1/embeddings", r#"{"input":"four"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["object"], "list");
        assert_eq!(json["model"], "ollama/nomic-embed-text");
        assert_eq!(json["data"][0]["embedding"], serde_json::json!([4.0]));
    }

    #[tokio::test]
    async fn test_switch_via_query() {
        let (app, registry) = app(StubGateway::default());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/provider/switch?provider=azure")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(registry.default_provider(), Provider::Azure);
    }

    #[tokio::test]
    async fn test_switch_without_provider_is_400() {
        let (app, registry) = app(StubGateway::default());

        let response = app.oneshot(post_json("/v1/provider/switch", "{}")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(registry.default_provider(), Provider::Local);
    }

    #[tokio::test]
    async fn test_provider_status_reports_default() {
        let (app, _) = app(StubGateway::default());

        let response = app
            .oneshot(Request::builder().uri("/v1/provider").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["default_provider"], "local");
        assert_eq!(json["configured"], true);
        assert_eq!(json["local_available"], true);
    }

    #[tokio::test]
    async fn test_cors_preflight_allowed_origin() {
        let registry = Arc::new(ProviderRegistry::new(Provider::Local, Vec::<ProviderConfig>::new()));
        let state = AppState::new(registry, Arc::new(GatewayTable::new()));
        let app = create_router(state, &CorsConfig::default());

        let response = app
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/v1/chat/completions")
                    .header("origin", "https://localhost:3000")
                    .header("access-control-request-method", "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "https://localhost:3000"
        );
    }

    fn preflight(origin: &str) -> Request<Body> {
        Request::builder()
            .method("OPTIONS")
            .uri("/v1/chat/completions")
            .header("origin", origin)
            .header("access-control-request-method", "POST")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_cors_preflight_office_subdomain() {
        let registry = Arc::new(ProviderRegistry::new(Provider::Local, Vec::<ProviderConfig>::new()));
        let state = AppState::new(registry, Arc::new(GatewayTable::new()));
        let app = create_router(state, &CorsConfig::default());

        let response = app
            .clone()
            .oneshot(preflight("https://word-edit.officeapps.live.com"))
            .await
            .unwrap();
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "https://word-edit.officeapps.live.com"
        );

        let response = app.oneshot(preflight("https://example.com")).await.unwrap();
        assert!(response.headers().get("access-control-allow-origin").is_none());
    }

    #[tokio::test]
    async fn test_serve_stops_on_cancel() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (app, _) = app(StubGateway::default());
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(serve(listener, app, cancel.clone()));
        cancel.cancel();

        handle.await.unwrap().unwrap();
    }
}
