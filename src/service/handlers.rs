use crate::error::{GatewayError, Result};
use crate::llm::provider::Provider;
use crate::llm::resolver::get_model_resolver;
use crate::router::CompletionOutcome;
use crate::service::dto::{
    ChatCompletionBody, ChatCompletionObject, EmbeddingsBody, EmbeddingsObject, HealthResponse,
    ModelsList, ProviderStatus, SwitchBody, SwitchResponse,
};
use crate::service::sse::event_frames;
use crate::service::AppState;
use axum::body::{Body, Bytes};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::{debug, info};

/// Health check; touches no backend.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let providers = state
        .registry
        .providers()
        .into_iter()
        .map(|(provider, configured)| (provider.to_string(), configured))
        .collect();

    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "LLM Gateway".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        default_provider: state.registry.default_provider(),
        providers,
    })
}

pub async fn chat_completions(
    State(state): State<AppState>,
    body: std::result::Result<Json<ChatCompletionBody>, JsonRejection>,
) -> Result<Response> {
    let Json(body) = body?;
    let request = body.into_request()?;
    debug!(
        model = %request.model,
        streaming = request.stream,
        provider = ?request.provider,
        "POST /v1/chat/completions"
    );

    match state.completions.route(request).await? {
        CompletionOutcome::Complete(response) => {
            Ok(Json(ChatCompletionObject::from_response(response)).into_response())
        }
        CompletionOutcome::Stream(stream) => Ok(Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/event-stream")
            .header(header::CACHE_CONTROL, "no-cache")
            .header("x-accel-buffering", "no")
            .body(Body::from_stream(event_frames(stream)))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())),
    }
}

pub async fn embeddings(
    State(state): State<AppState>,
    body: std::result::Result<Json<EmbeddingsBody>, JsonRejection>,
) -> Result<Json<EmbeddingsObject>> {
    let Json(body) = body?;
    let request = body.into_request()?;
    debug!(model = %request.model, inputs = request.inputs.len(), "POST /v1/embeddings");

    let response = state.embeddings.embed(request).await?;
    Ok(Json(EmbeddingsObject::from(response)))
}

pub async fn list_models() -> Json<ModelsList> {
    Json(ModelsList::from_resolver(get_model_resolver()))
}

/// Switch the default provider.
///
/// The provider comes from a `{"provider": ...}` body or a `?provider=` query;
/// the body wins when both are present.
pub async fn switch_provider(
    State(state): State<AppState>,
    query: std::result::Result<Query<SwitchBody>, QueryRejection>,
    body: Bytes,
) -> Result<Json<SwitchResponse>> {
    let Query(query) = query?;

    let from_body = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        serde_json::from_slice::<SwitchBody>(&body)
            .map_err(|e| GatewayError::InvalidRequest(format!("Invalid request body: {}", e)))?
            .provider
    };

    let name = from_body
        .or(query.provider)
        .ok_or_else(|| GatewayError::InvalidRequest("provider is required".to_string()))?;

    let provider: Provider = name.trim().parse()?;
    let previous = state.registry.replace_default(provider);
    info!(provider = %provider, configured = state.registry.is_configured(provider), "Default provider switched via API");

    Ok(Json(SwitchResponse {
        status: "success".to_string(),
        provider,
        previous,
    }))
}

/// Current default provider plus a live probe of the local runtime.
pub async fn provider_status(State(state): State<AppState>) -> Json<ProviderStatus> {
    let default_provider = state.registry.default_provider();

    let local_available = match state.gateways.get_gateway(Provider::Local) {
        Some(gateway) => gateway.is_available().await,
        None => false,
    };

    Json(ProviderStatus {
        default_provider,
        configured: state.registry.is_configured(default_provider),
        local_available,
    })
}
