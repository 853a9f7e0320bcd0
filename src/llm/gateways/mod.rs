pub mod azure;
pub mod lines;
pub mod ollama;
pub mod openai;
pub mod wire;

pub use azure::{AzureConfig, AzureGateway};
pub use ollama::{OllamaConfig, OllamaGateway};
pub use openai::{OpenAIConfig, OpenAIGateway};
