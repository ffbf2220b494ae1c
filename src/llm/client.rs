//! Reasoning oracle abstractions and provider selection
//!
//! Research tasks talk to the model through [`LLMClient`] only:
//! - **free text** via [`LLMClient::generate_with_system`] (topic notes)
//! - **schema-constrained JSON** via [`LLMClient::generate_json`] and
//!   [`generate_structured`] (sufficiency checks, content selection)
//! - **tool selection** via [`LLMClient::generate_with_tools`]
//!
//! Providers only have to implement free-text generation; the structured
//! calls have prompt-based default implementations that providers with
//! native JSON or tool-calling support may override.

use crate::types::{AppError, Result, ToolCall, ToolDefinition};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

/// Generic LLM client trait for provider abstraction
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Generate a completion from a prompt
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_with_system("You are a helpful research assistant.", prompt)
            .await
    }

    /// Generate with system prompt
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String>;

    /// Generate a JSON object conforming to `schema`.
    async fn generate_json(&self, system: &str, prompt: &str, schema: &Value) -> Result<Value> {
        let system = format!(
            "{}\n\nRespond with a single JSON object and nothing else. \
             The object must conform to this JSON schema:\n{}",
            system, schema
        );
        let reply = self.generate_with_system(&system, prompt).await?;
        extract_json_object(&reply)
    }

    /// Ask the model which of `tools` to call for `prompt`.
    async fn generate_with_tools(
        &self,
        prompt: &str,
        tools: &[ToolDefinition],
    ) -> Result<LLMResponse> {
        let system = tool_selection_prompt(tools);
        let reply = self.generate_with_system(&system, prompt).await?;
        Ok(parse_tool_reply(reply))
    }

    /// Get the model name/identifier
    fn model_name(&self) -> &str;
}

/// Response from an LLM generation request
#[derive(Debug, Clone)]
pub struct LLMResponse {
    /// The text content of the response
    pub content: String,
    /// Any tool calls requested by the model
    pub tool_calls: Vec<ToolCall>,
    /// The reason generation stopped (e.g., "stop", "tool_calls", "length")
    pub finish_reason: String,
}

/// Ask for a JSON reply shaped like `T` and deserialize it.
///
/// The schema is derived from `T`, so field names in the prompt and in the
/// parsed reply always agree.
pub async fn generate_structured<T>(client: &dyn LLMClient, system: &str, prompt: &str) -> Result<T>
where
    T: DeserializeOwned + JsonSchema,
{
    let schema = serde_json::to_value(schemars::schema_for!(T))
        .map_err(|e| AppError::Internal(format!("Failed to render schema: {}", e)))?;
    let value = client.generate_json(system, prompt, &schema).await?;
    serde_json::from_value(value)
        .map_err(|e| AppError::LLM(format!("Response did not match expected shape: {}", e)))
}

/// Pull the first JSON object out of a model reply, tolerating code fences
/// and surrounding prose.
pub fn extract_json_object(text: &str) -> Result<Value> {
    let start = text
        .find('{')
        .ok_or_else(|| AppError::LLM(format!("No JSON object in response: {}", preview(text))))?;

    let mut values = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
    match values.next() {
        Some(Ok(value)) => Ok(value),
        Some(Err(e)) => Err(AppError::LLM(format!(
            "Malformed JSON in response ({}): {}",
            e,
            preview(text)
        ))),
        None => Err(AppError::LLM("Empty response".to_string())),
    }
}

fn preview(text: &str) -> String {
    text.chars().take(200).collect()
}

fn tool_selection_prompt(tools: &[ToolDefinition]) -> String {
    let mut prompt = String::from(
        "You decide which tools to call to gather information about the user's topic.\n\
         Available tools:\n",
    );
    for tool in tools {
        prompt.push_str(&format!(
            "- {}: {}\n  parameters: {}\n",
            tool.name, tool.description, tool.parameters
        ));
    }
    prompt.push_str(
        "\nRespond with a JSON object of the form \
         {\"tool_calls\": [{\"name\": \"<tool name>\", \"arguments\": {}}]}. \
         Use an empty list if no tool applies.",
    );
    prompt
}

#[derive(Deserialize)]
struct ToolReply {
    #[serde(default)]
    tool_calls: Vec<ToolReplyCall>,
}

#[derive(Deserialize)]
struct ToolReplyCall {
    name: String,
    #[serde(default)]
    arguments: Value,
}

fn parse_tool_reply(reply: String) -> LLMResponse {
    let tool_calls: Vec<ToolCall> = extract_json_object(&reply)
        .ok()
        .and_then(|value| serde_json::from_value::<ToolReply>(value).ok())
        .map(|parsed| {
            parsed
                .tool_calls
                .into_iter()
                .enumerate()
                .map(|(i, call)| ToolCall {
                    id: format!("call_{}", i),
                    name: call.name,
                    arguments: call.arguments,
                })
                .collect()
        })
        .unwrap_or_default();

    let finish_reason = if tool_calls.is_empty() {
        "stop"
    } else {
        "tool_calls"
    };

    LLMResponse {
        content: reply,
        tool_calls,
        finish_reason: finish_reason.to_string(),
    }
}

/// Provider enum for runtime selection
#[derive(Debug, Clone)]
pub enum Provider {
    /// OpenAI API provider (including compatible APIs)
    ///
    /// # Example
    /// ```rust,ignore
    /// let provider = Provider::OpenAI {
    ///     api_key: "sk-...".to_string(),
    ///     api_base: "https://api.openai.com/v1".to_string(),
    ///     model: "gpt-4o-mini".to_string(),
    ///     embedding_model: "text-embedding-3-small".to_string(),
    /// };
    /// ```
    OpenAI {
        api_key: String,
        api_base: String,
        model: String,
        embedding_model: String,
    },

    /// Ollama local LLM provider
    ///
    /// # Example
    /// ```rust,ignore
    /// let provider = Provider::Ollama {
    ///     base_url: "http://localhost:11434".to_string(),
    ///     model: "llama3.2".to_string(),
    ///     embedding_model: "nomic-embed-text".to_string(),
    /// };
    /// ```
    Ollama {
        base_url: String,
        model: String,
        embedding_model: String,
    },
}

impl Provider {
    /// Create a client instance for this provider
    ///
    /// # Errors
    ///
    /// Returns an error if the provider's Cargo feature is not enabled.
    pub async fn create_client(&self) -> Result<Arc<dyn LLMClient>> {
        match self {
            #[cfg(feature = "openai")]
            Provider::OpenAI {
                api_key,
                api_base,
                model,
                embedding_model,
            } => Ok(Arc::new(super::openai::OpenAIClient::new(
                api_key.clone(),
                api_base.clone(),
                model.clone(),
                embedding_model.clone(),
            ))),

            #[cfg(feature = "ollama")]
            Provider::Ollama {
                base_url,
                model,
                embedding_model,
            } => Ok(Arc::new(
                super::ollama::OllamaClient::new(
                    base_url.clone(),
                    model.clone(),
                    embedding_model.clone(),
                )
                .await?,
            )),

            #[allow(unreachable_patterns)]
            other => Err(AppError::Configuration(format!(
                "{} support is not compiled in; rebuild with --features {}",
                other.name(),
                other.feature()
            ))),
        }
    }

    /// Create an embedder backed by the same provider, for the notes index.
    pub async fn create_embedder(&self) -> Result<Arc<dyn crate::rag::Embedder>> {
        match self {
            #[cfg(feature = "openai")]
            Provider::OpenAI {
                api_key,
                api_base,
                model,
                embedding_model,
            } => Ok(Arc::new(super::openai::OpenAIClient::new(
                api_key.clone(),
                api_base.clone(),
                model.clone(),
                embedding_model.clone(),
            ))),

            #[cfg(feature = "ollama")]
            Provider::Ollama {
                base_url,
                model,
                embedding_model,
            } => Ok(Arc::new(
                super::ollama::OllamaClient::new(
                    base_url.clone(),
                    model.clone(),
                    embedding_model.clone(),
                )
                .await?,
            )),

            #[allow(unreachable_patterns)]
            other => Err(AppError::Configuration(format!(
                "{} support is not compiled in; rebuild with --features {}",
                other.name(),
                other.feature()
            ))),
        }
    }

    /// Check if this provider's feature is compiled in
    pub fn is_enabled(&self) -> bool {
        match self {
            Provider::OpenAI { .. } => cfg!(feature = "openai"),
            Provider::Ollama { .. } => cfg!(feature = "ollama"),
        }
    }

    /// Get a human-readable name for this provider
    pub fn name(&self) -> &'static str {
        match self {
            Provider::OpenAI { .. } => "OpenAI",
            Provider::Ollama { .. } => "Ollama",
        }
    }

    fn feature(&self) -> &'static str {
        match self {
            Provider::OpenAI { .. } => "openai",
            Provider::Ollama { .. } => "ollama",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoClient {
        reply: String,
    }

    #[async_trait]
    impl LLMClient for EchoClient {
        async fn generate_with_system(&self, _system: &str, _prompt: &str) -> Result<String> {
            Ok(self.reply.clone())
        }

        fn model_name(&self) -> &str {
            "echo"
        }
    }

    #[test]
    fn test_extract_json_from_fenced_reply() {
        let reply = "Sure!\n```json\n{\"research_topics\": [\"a\", \"b\"]}\n```\nDone.";
        let value = extract_json_object(reply).unwrap();
        assert_eq!(value["research_topics"][1], "b");
    }

    #[test]
    fn test_extract_json_without_object_fails() {
        assert!(matches!(
            extract_json_object("no json here"),
            Err(AppError::LLM(_))
        ));
    }

    #[test]
    fn test_parse_tool_reply() {
        let response = parse_tool_reply(
            r#"{"tool_calls": [{"name": "web_search", "arguments": {"num_results": 3}}]}"#
                .to_string(),
        );
        assert_eq!(response.finish_reason, "tool_calls");
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].name, "web_search");
        assert_eq!(response.tool_calls[0].arguments["num_results"], 3);
    }

    #[test]
    fn test_parse_tool_reply_garbage_is_no_calls() {
        let response = parse_tool_reply("I cannot help with that".to_string());
        assert!(response.tool_calls.is_empty());
        assert_eq!(response.finish_reason, "stop");
    }

    #[derive(Debug, Deserialize, JsonSchema)]
    struct Topics {
        research_topics: Vec<String>,
    }

    #[tokio::test]
    async fn test_generate_structured_roundtrip() {
        let client = EchoClient {
            reply: r#"{"research_topics": ["solar output in winter"]}"#.to_string(),
        };
        let topics: Topics = generate_structured(&client, "system", "prompt")
            .await
            .unwrap();
        assert_eq!(topics.research_topics, vec!["solar output in winter"]);
    }

    #[tokio::test]
    async fn test_generate_structured_shape_mismatch() {
        let client = EchoClient {
            reply: r#"{"something_else": 1}"#.to_string(),
        };
        let result: Result<Topics> = generate_structured(&client, "system", "prompt").await;
        assert!(matches!(result, Err(AppError::LLM(_))));
    }

    #[test]
    fn test_provider_name() {
        let ollama = Provider::Ollama {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.2".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
        };
        assert_eq!(ollama.name(), "Ollama");
        assert_eq!(ollama.is_enabled(), cfg!(feature = "ollama"));
    }
}
