//! Provider registry: connection settings and the process-wide default provider.
//!
//! Connection settings are fixed at startup. The default provider is the only mutable
//! routing state in the gateway; it lives in a single lock so that every reader sees
//! either the previous or the new value, and concurrent switches are serialized.
//! Nothing is persisted: a restart returns to the configured default.

use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};
use crate::llm::gateways::{AzureConfig, OllamaConfig, OpenAIConfig};
use crate::llm::provider::Provider;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tracing::info;

/// Immutable connection parameters for one provider
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderConfig {
    Local(OllamaConfig),
    OpenAI(OpenAIConfig),
    Azure(AzureConfig),
}

impl ProviderConfig {
    pub fn provider(&self) -> Provider {
        match self {
            ProviderConfig::Local(_) => Provider::Local,
            ProviderConfig::OpenAI(_) => Provider::OpenAI,
            ProviderConfig::Azure(_) => Provider::Azure,
        }
    }
}

/// Settings a provider needs before it can serve requests.
fn required_settings(provider: Provider) -> &'static str {
    match provider {
        Provider::Local => "LOCAL_LLM_URL",
        Provider::OpenAI => "OPENAI_API_KEY",
        Provider::Azure => "AZURE_OPENAI_ENDPOINT and AZURE_OPENAI_KEY",
    }
}

pub struct ProviderRegistry {
    default_provider: RwLock<Provider>,
    configs: HashMap<Provider, ProviderConfig>,
}

impl ProviderRegistry {
    /// Create a registry from the connection settings supplied at startup.
    ///
    /// Providers without an entry in `configs` stay known but unconfigured.
    pub fn new(default_provider: Provider, configs: impl IntoIterator<Item = ProviderConfig>) -> Self {
        let configs = configs.into_iter().map(|c| (c.provider(), c)).collect();

        Self {
            default_provider: RwLock::new(default_provider),
            configs,
        }
    }

    /// Build a registry from startup configuration.
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(config.default_provider, config.provider_configs())
    }

    /// Current default provider.
    pub fn default_provider(&self) -> Provider {
        *self.default_provider.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the default provider, returning the previous one.
    pub fn replace_default(&self, provider: Provider) -> Provider {
        let mut current = self.default_provider.write().unwrap_or_else(PoisonError::into_inner);
        let previous = std::mem::replace(&mut *current, provider);
        info!(from = %previous, to = %provider, "Switched default provider");
        previous
    }

    /// Switch the default provider by wire name.
    ///
    /// Unknown names fail with [`GatewayError::InvalidProvider`] and leave the default
    /// untouched. Switching to a known but unconfigured provider is allowed; requests
    /// routed to it fail with [`GatewayError::ProviderNotConfigured`].
    pub fn set_default(&self, name: &str) -> Result<Provider> {
        let provider: Provider = name.parse()?;
        self.replace_default(provider);
        Ok(provider)
    }

    /// Connection parameters for a provider.
    pub fn connection_config(&self, provider: Provider) -> Result<&ProviderConfig> {
        self.configs.get(&provider).ok_or_else(|| {
            GatewayError::ProviderNotConfigured(format!(
                "{} (set {})",
                provider,
                required_settings(provider)
            ))
        })
    }

    pub fn is_configured(&self, provider: Provider) -> bool {
        self.configs.contains_key(&provider)
    }

    /// Every known provider with its configured flag, in reporting order.
    pub fn providers(&self) -> Vec<(Provider, bool)> {
        Provider::ALL.into_iter().map(|p| (p, self.is_configured(p))).collect()
    }
}
