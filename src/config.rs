//! Process configuration, read once from the environment at startup.
//!
//! `.env` files are loaded by the binary before [`GatewayConfig::from_env`] runs.
//! Empty variables count as unset.

use crate::error::{GatewayError, Result};
use crate::llm::gateways::azure::DEFAULT_AZURE_API_VERSION;
use crate::llm::gateways::ollama::DEFAULT_OLLAMA_URL;
use crate::llm::gateways::openai::DEFAULT_OPENAI_URL;
use crate::llm::gateways::{AzureConfig, OllamaConfig, OpenAIConfig};
use crate::llm::provider::Provider;
use crate::llm::registry::ProviderConfig;
use std::time::Duration;

/// Origins allowed by default: the Office add-in dev server and Office hosts.
///
/// A `*.` label matches any subdomain of what follows it.
pub const DEFAULT_CORS_ORIGINS: &[&str] = &[
    "http://localhost:3000",
    "https://localhost:3000",
    "https://*.officeapps.live.com",
    "https://*.office.com",
];

#[derive(Debug, Clone, PartialEq)]
pub enum CorsConfig {
    AllowAll,
    AllowOrigins(Vec<String>),
}

impl CorsConfig {
    /// Whether a request `Origin` header value is allowed.
    pub fn allows(&self, origin: &str) -> bool {
        match self {
            CorsConfig::AllowAll => true,
            CorsConfig::AllowOrigins(patterns) => {
                patterns.iter().any(|pattern| origin_matches(pattern, origin))
            }
        }
    }
}

fn origin_matches(pattern: &str, origin: &str) -> bool {
    let Some((scheme, domain)) = pattern.split_once("*.") else {
        return pattern == origin;
    };

    origin
        .strip_prefix(scheme)
        .and_then(|host| host.strip_suffix(domain))
        .and_then(|sub| sub.strip_suffix('.'))
        .is_some_and(|sub| !sub.is_empty() && !sub.contains(['/', ':', '*']))
}

impl Default for CorsConfig {
    fn default() -> Self {
        CorsConfig::AllowOrigins(DEFAULT_CORS_ORIGINS.iter().map(|o| o.to_string()).collect())
    }
}

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors: CorsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            cors: CorsConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    pub default_provider: Provider,
    pub local: OllamaConfig,
    pub openai: Option<OpenAIConfig>,
    pub azure: Option<AzureConfig>,
    pub server: ServerConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            default_provider: Provider::Local,
            local: OllamaConfig::default(),
            openai: None,
            azure: None,
            server: ServerConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Read configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let default_provider = match get("LLM_PROVIDER") {
            Some(name) => name.parse().map_err(|_| {
                GatewayError::ConfigError(format!("LLM_PROVIDER: unknown provider '{}'", name))
            })?,
            None => Provider::Local,
        };

        let local_timeout = parse_secs(get("LOCAL_LLM_TIMEOUT_SECS"), "LOCAL_LLM_TIMEOUT_SECS")?;
        let upstream_timeout = parse_secs(get("UPSTREAM_TIMEOUT_SECS"), "UPSTREAM_TIMEOUT_SECS")?;

        let local = OllamaConfig {
            host: get("LOCAL_LLM_URL").unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            timeout: local_timeout,
        };

        let openai = get("OPENAI_API_KEY").map(|api_key| OpenAIConfig {
            api_key,
            base_url: get("OPENAI_API_ENDPOINT").unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string()),
            timeout: upstream_timeout,
        });

        let azure = match (get("AZURE_OPENAI_ENDPOINT"), get("AZURE_OPENAI_KEY")) {
            (Some(endpoint), Some(api_key)) => Some(AzureConfig {
                endpoint,
                api_key,
                api_version: get("AZURE_OPENAI_API_VERSION")
                    .unwrap_or_else(|| DEFAULT_AZURE_API_VERSION.to_string()),
                timeout: upstream_timeout,
            }),
            _ => None,
        };

        let port = match get("GATEWAY_PORT") {
            Some(port) => port
                .parse()
                .map_err(|_| GatewayError::ConfigError(format!("GATEWAY_PORT: invalid port '{}'", port)))?,
            None => 8000,
        };

        let cors = match get("GATEWAY_CORS_ORIGINS") {
            Some(origins) if origins == "*" => CorsConfig::AllowAll,
            Some(origins) => CorsConfig::AllowOrigins(
                origins
                    .split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(String::from)
                    .collect(),
            ),
            None => CorsConfig::default(),
        };

        Ok(Self {
            default_provider,
            local,
            openai,
            azure,
            server: ServerConfig {
                host: get("GATEWAY_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
                port,
                cors,
            },
        })
    }

    /// Connection settings for every provider that has them.
    pub fn provider_configs(&self) -> Vec<ProviderConfig> {
        let mut configs = vec![ProviderConfig::Local(self.local.clone())];
        if let Some(openai) = &self.openai {
            configs.push(ProviderConfig::OpenAI(openai.clone()));
        }
        if let Some(azure) = &self.azure {
            configs.push(ProviderConfig::Azure(azure.clone()));
        }
        configs
    }
}

fn parse_secs(value: Option<String>, key: &str) -> Result<Option<Duration>> {
    value
        .map(|v| {
            v.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| GatewayError::ConfigError(format!("{}: expected seconds, got '{}'", key, v)))
        })
        .transpose()
}
