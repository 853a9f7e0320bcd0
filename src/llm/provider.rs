use crate::error::GatewayError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Backend an LLM request can be routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Locally hosted Ollama runtime
    Local,
    /// Hosted OpenAI API
    OpenAI,
    /// Azure OpenAI deployments
    Azure,
}

impl Provider {
    /// Every known provider, in reporting order
    pub const ALL: [Provider; 3] = [Provider::Local, Provider::OpenAI, Provider::Azure];

    /// Wire name used in requests, responses and configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Local => "local",
            Provider::OpenAI => "openai",
            Provider::Azure => "azure",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Provider::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| GatewayError::InvalidProvider(s.to_string()))
    }
}
