//! Request routing from provider-independent requests to backend gateways.
//!
//! This module provides the [`GatewayTable`] that maps each [`Provider`] to the
//! transport serving it, plus the completion and embedding routers built on top.
//! Both routers share one selection step: pick the provider (explicit or the
//! registry default), check it is configured, translate the generic model id.

pub mod completion;
pub mod embedding;
pub mod stream;

pub use completion::{CompletionOutcome, CompletionRouter};
pub use embedding::EmbeddingRouter;
pub use stream::{CompletionStream, StreamEvent};

use crate::error::{GatewayError, Result};
use crate::llm::gateway::LlmGateway;
use crate::llm::gateways::{AzureGateway, OllamaGateway, OpenAIGateway};
use crate::llm::provider::Provider;
use crate::llm::registry::{ProviderConfig, ProviderRegistry};
use crate::llm::resolver::get_model_resolver;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Dispatch table from provider to transport.
///
/// # Examples
///
/// ```ignore
/// use llm_gateway::router::GatewayTable;
///
/// let mut table = GatewayTable::new();
/// table.add_gateway(Provider::Local, Arc::new(OllamaGateway::new()?));
/// ```
#[derive(Clone, Default)]
pub struct GatewayTable {
    gateways: HashMap<Provider, Arc<dyn LlmGateway>>,
}

impl GatewayTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Build one gateway per configured provider in the registry
    pub fn from_registry(registry: &ProviderRegistry) -> Result<Self> {
        let mut table = Self::new();

        for (provider, configured) in registry.providers() {
            if !configured {
                continue;
            }

            let gateway: Arc<dyn LlmGateway> = match registry.connection_config(provider)? {
                ProviderConfig::Local(config) => Arc::new(OllamaGateway::with_config(config.clone())?),
                ProviderConfig::OpenAI(config) => Arc::new(OpenAIGateway::with_config(config.clone())?),
                ProviderConfig::Azure(config) => Arc::new(AzureGateway::with_config(config.clone())?),
            };
            table.add_gateway(provider, gateway);
        }

        Ok(table)
    }

    /// Register (or replace) the transport for a provider
    pub fn add_gateway(&mut self, provider: Provider, gateway: Arc<dyn LlmGateway>) {
        self.gateways.insert(provider, gateway);
    }

    /// Builder form of [`GatewayTable::add_gateway`]
    pub fn with_gateway(mut self, provider: Provider, gateway: Arc<dyn LlmGateway>) -> Self {
        self.add_gateway(provider, gateway);
        self
    }

    pub fn get_gateway(&self, provider: Provider) -> Option<Arc<dyn LlmGateway>> {
        self.gateways.get(&provider).cloned()
    }
}

/// Outcome of provider selection for one request
pub(crate) struct Dispatch {
    pub provider: Provider,
    pub model: String,
    pub gateway: Arc<dyn LlmGateway>,
}

/// Select provider, check its configuration and resolve the native model id.
pub(crate) fn select(
    registry: &ProviderRegistry,
    gateways: &GatewayTable,
    requested: Option<Provider>,
    generic_model: &str,
) -> Result<Dispatch> {
    let provider = requested.unwrap_or_else(|| registry.default_provider());

    registry.connection_config(provider)?;
    let gateway = gateways.get_gateway(provider).ok_or_else(|| {
        GatewayError::ProviderNotConfigured(format!("{} has no transport", provider))
    })?;

    let model = get_model_resolver().resolve_for_dispatch(provider, generic_model);
    debug!(provider = %provider, generic = generic_model, native = %model, "Resolved model");

    Ok(Dispatch {
        provider,
        model,
        gateway,
    })
}
