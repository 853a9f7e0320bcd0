//! Error types and result aliases for the gateway.
//!
//! This module defines the core error type [`GatewayError`] and the [`Result`] type alias
//! used throughout the crate. Every routing failure maps onto one of four client-visible
//! kinds (invalid request, invalid provider, provider not configured, upstream failure);
//! the remaining variants cover local plumbing such as serialization and IO.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid provider: {0}")]
    InvalidProvider(String),

    #[error("Provider not configured: {0}")]
    ProviderNotConfigured(String),

    #[error("Upstream failure: {0}")]
    UpstreamFailure(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl GatewayError {
    /// Wrap a backend transport error, keeping its text verbatim.
    pub fn upstream(err: impl std::fmt::Display) -> Self {
        GatewayError::UpstreamFailure(err.to_string())
    }

    /// HTTP status this error should surface as.
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::InvalidRequest(_) | GatewayError::InvalidProvider(_) => 400,
            GatewayError::SerializationError(_) => 400,
            GatewayError::ProviderNotConfigured(_) => 503,
            GatewayError::UpstreamFailure(_) | GatewayError::HttpError(_) => 502,
            GatewayError::ConfigError(_) | GatewayError::IoError(_) => 500,
        }
    }

    /// Stable machine-readable discriminant, used as the OpenAI error `type`.
    pub fn error_type(&self) -> &'static str {
        match self {
            GatewayError::InvalidRequest(_) | GatewayError::SerializationError(_) => {
                "invalid_request_error"
            }
            GatewayError::InvalidProvider(_) => "invalid_provider",
            GatewayError::ProviderNotConfigured(_) => "provider_not_configured",
            GatewayError::UpstreamFailure(_) | GatewayError::HttpError(_) => "upstream_error",
            GatewayError::ConfigError(_) | GatewayError::IoError(_) => "internal_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
