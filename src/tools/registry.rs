use crate::types::{AppError, RawDocument, Result, ToolDefinition};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// A source of raw documents for a topic (web search, news, company data...).
#[async_trait]
pub trait ContentProvider: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters_schema(&self) -> Value;

    /// Whether this provider should be offered for `topic` at all.
    fn can_handle(&self, _topic: &str) -> bool {
        true
    }

    /// Fetch documents for `topic`. `args` are the oracle's chosen arguments
    /// with `query` already set to the topic.
    async fn fetch(&self, topic: &str, args: &Value) -> Result<Vec<RawDocument>>;
}

/// Closed table of content providers keyed by name. The oracle can only pick
/// from what was registered here.
pub struct ToolRegistry {
    providers: HashMap<String, Arc<dyn ContentProvider>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// Registry holding the built-in web search provider.
    pub fn with_web_search(num_results: usize) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(crate::tools::search::WebSearchProvider::new(
            num_results,
        )));
        registry
    }

    pub fn register(&mut self, provider: Arc<dyn ContentProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ContentProvider>> {
        self.providers.get(name).cloned()
    }

    /// Definitions of the providers that can handle `topic`, sorted by name.
    pub fn definitions_for(&self, topic: &str) -> Vec<ToolDefinition> {
        let mut definitions: Vec<ToolDefinition> = self
            .providers
            .values()
            .filter(|provider| provider.can_handle(topic))
            .map(|provider| ToolDefinition {
                name: provider.name().to_string(),
                description: provider.description().to_string(),
                parameters: provider.parameters_schema(),
            })
            .collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    /// Call a provider by name. The topic always overrides any `query`
    /// argument the oracle supplied.
    pub async fn invoke(&self, name: &str, topic: &str, args: &Value) -> Result<Vec<RawDocument>> {
        let provider = self
            .providers
            .get(name)
            .ok_or_else(|| AppError::NotFound(format!("Content provider not found: {}", name)))?;

        let mut merged = match args {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        merged.insert("query".to_string(), Value::String(topic.to_string()));

        provider.fetch(topic, &Value::Object(merged)).await
    }

    /// Get a list of all registered provider names, sorted
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
