//! Web search content provider using daedra
//!
//! daedra queries DuckDuckGo; results come back as title, url and a short
//! description, so documents from this provider usually need scraping
//! before their content is useful.

use crate::tools::registry::ContentProvider;
use crate::types::{AppError, RawDocument, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

/// Web search provider powered by daedra
pub struct WebSearchProvider {
    default_results: usize,
}

impl WebSearchProvider {
    pub fn new(default_results: usize) -> Self {
        Self {
            default_results: default_results.max(1),
        }
    }
}

impl Default for WebSearchProvider {
    fn default() -> Self {
        Self::new(10)
    }
}

#[async_trait]
impl ContentProvider for WebSearchProvider {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for pages about a topic using DuckDuckGo"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                },
                "num_results": {
                    "type": "integer",
                    "description": format!(
                        "Maximum number of results to return (default: {})",
                        self.default_results
                    ),
                    "default": self.default_results
                }
            },
            "required": ["query"]
        })
    }

    async fn fetch(&self, topic: &str, args: &Value) -> Result<Vec<RawDocument>> {
        let query = args
            .get("query")
            .and_then(|v| v.as_str())
            .unwrap_or(topic);
        if query.trim().is_empty() {
            return Err(AppError::InvalidInput("Missing 'query' parameter".to_string()));
        }

        let num_results = args
            .get("num_results")
            .and_then(|v| v.as_u64())
            .map(|n| n as usize)
            .unwrap_or(self.default_results);

        let search_args = daedra::SearchArgs {
            query: query.to_string(),
            options: Some(daedra::SearchOptions {
                num_results,
                ..Default::default()
            }),
        };

        let response = daedra::tools::search::perform_search(&search_args)
            .await
            .map_err(|e| AppError::Tool(format!("Search failed: {}", e)))?;

        let documents: Vec<RawDocument> = response
            .data
            .iter()
            .map(|r| RawDocument {
                url: r.url.to_string(),
                title: r.title.to_string(),
                snippet: r.description.to_string(),
                content: String::new(),
                source: "web_search".to_string(),
            })
            .collect();

        tracing::debug!(query, count = documents.len(), "Web search complete");
        Ok(documents)
    }
}
