//! Generic-to-native model name resolution.
//!
//! Callers name models with provider-independent labels (the OpenAI names the
//! gateway's clients already use). Each provider serves those labels under its own
//! native identifier; this module holds that static mapping and the model catalog
//! derived from it.

use crate::llm::provider::Provider;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Namespace the local runtime's model ids are published under.
pub const LOCAL_MODEL_PREFIX: &str = "ollama/";

/// Generic model ids served by the gateway, in catalog order.
const GENERIC_MODELS: [&str; 3] = ["gpt-3.5-turbo", "gpt-4", "text-embedding-ada-002"];

/// Static (provider, generic id) -> native id table.
pub struct ModelNameResolver {
    table: HashMap<Provider, HashMap<&'static str, &'static str>>,
}

impl ModelNameResolver {
    /// Create a resolver with the default model table.
    pub fn new() -> Self {
        let entries: [(Provider, &'static str, &'static str); 9] = [
            (Provider::Local, "gpt-3.5-turbo", "llama2"),
            (Provider::Local, "gpt-4", "llama2:70b"),
            (Provider::Local, "text-embedding-ada-002", "nomic-embed-text"),
            (Provider::OpenAI, "gpt-3.5-turbo", "gpt-3.5-turbo"),
            (Provider::OpenAI, "gpt-4", "gpt-4"),
            (Provider::OpenAI, "text-embedding-ada-002", "text-embedding-ada-002"),
            (Provider::Azure, "gpt-3.5-turbo", "azure/gpt-35-turbo"),
            (Provider::Azure, "gpt-4", "azure/gpt-4"),
            (Provider::Azure, "text-embedding-ada-002", "azure/text-embedding-ada-002"),
        ];

        let mut table: HashMap<Provider, HashMap<&'static str, &'static str>> = HashMap::new();
        for (provider, generic, native) in entries {
            table.entry(provider).or_default().insert(generic, native);
        }

        Self { table }
    }

    fn native(&self, provider: Provider, generic_model: &str) -> Option<&'static str> {
        self.table.get(&provider)?.get(generic_model).copied()
    }

    /// Resolve a generic id for a provider.
    ///
    /// Unknown pairs pass through unchanged so callers can use native names directly.
    pub fn resolve(&self, provider: Provider, generic_model: &str) -> String {
        self.native(provider, generic_model)
            .map(String::from)
            .unwrap_or_else(|| generic_model.to_string())
    }

    /// Resolve and apply the provider's dispatch namespace.
    ///
    /// Local models are published as `ollama/<name>`; hosted providers are used as-is.
    pub fn resolve_for_dispatch(&self, provider: Provider, generic_model: &str) -> String {
        let native = self.resolve(provider, generic_model);
        match provider {
            Provider::Local if !native.starts_with(LOCAL_MODEL_PREFIX) => {
                format!("{LOCAL_MODEL_PREFIX}{native}")
            }
            _ => native,
        }
    }

    /// Providers with a configured mapping for a generic id.
    pub fn providers_for(&self, generic_model: &str) -> Vec<Provider> {
        Provider::ALL
            .into_iter()
            .filter(|p| self.native(*p, generic_model).is_some())
            .collect()
    }

    /// Static catalog: every generic id and the providers that can serve it.
    pub fn catalog(&self) -> Vec<(&'static str, Vec<Provider>)> {
        GENERIC_MODELS
            .into_iter()
            .map(|model| (model, self.providers_for(model)))
            .collect()
    }
}

impl Default for ModelNameResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Global resolver instance.
pub static MODEL_RESOLVER: LazyLock<ModelNameResolver> = LazyLock::new(ModelNameResolver::new);

/// Get the global model resolver.
pub fn get_model_resolver() -> &'static ModelNameResolver {
    &MODEL_RESOLVER
}
