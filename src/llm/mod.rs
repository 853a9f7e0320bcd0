pub mod gateway;
pub mod gateways;
pub mod models;
pub mod provider;
pub mod registry;
pub mod resolver;

pub use gateway::{ChunkStream, CompletionParams, LlmEmbeddings, LlmGateway, LlmGatewayResponse, StreamChunk};
pub use models::{
    CompletionChunk, CompletionRequest, CompletionResponse, EmbeddingInput, EmbeddingRequest,
    EmbeddingResponse, LlmMessage, MessageRole, Usage,
};
pub use provider::Provider;
pub use registry::{ProviderConfig, ProviderRegistry};
pub use resolver::{get_model_resolver, ModelNameResolver};
