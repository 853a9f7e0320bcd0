//! LLM Gateway server.
//!
//! Reads configuration from the environment (and `.env`), then serves the
//! OpenAI-compatible API until Ctrl-C.

use anyhow::Context;
use llm_gateway::config::GatewayConfig;
use llm_gateway::llm::Provider;
use llm_gateway::service::{create_router, serve, AppState};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("llm_gateway=info,tower_http=info")),
        )
        .init();

    let config = GatewayConfig::from_env().context("Failed to load configuration")?;
    let state = AppState::from_config(&config).context("Failed to initialize providers")?;

    for (provider, configured) in state.registry.providers() {
        info!(provider = %provider, configured, "Provider");
    }
    info!(default_provider = %config.default_provider, "Starting LLM Gateway");

    if let Some(local) = state.gateways.get_gateway(Provider::Local) {
        if !local.is_available().await {
            warn!("Local runtime at {} is not reachable", config.local.host);
        }
    }

    let addr = config.server.bind_address();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
        }
        shutdown.cancel();
    });

    let app = create_router(state, &config.server.cors);
    serve(listener, app, cancel).await?;

    Ok(())
}
