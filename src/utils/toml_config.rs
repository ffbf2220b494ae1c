//! TOML-based configuration for sleuth
//!
//! Every section of `sleuth.toml` is optional and falls back to defaults, so
//! an empty file is a valid configuration. Secrets are never stored in the
//! file: `[llm] api_key_env` names the environment variable to read.

use crate::db::StoreProvider;
use crate::llm::Provider;
use crate::research::{ResearchSettings, SchedulerSettings};
use crate::types::AppError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure loaded from sleuth.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SleuthConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub research: ResearchConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub scrape: ScrapeConfig,
    #[serde(default)]
    pub index: IndexConfig,
}

// ============= LLM Configuration =============

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderKind {
    #[default]
    Ollama,
    OpenAI,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProviderKind,

    #[serde(default = "default_model")]
    pub model: String,

    /// Provider endpoint; defaults depend on the provider
    pub base_url: Option<String>,

    /// Environment variable name containing the API key (OpenAI only)
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

fn default_model() -> String {
    "llama3.2".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProviderKind::default(),
            model: default_model(),
            base_url: None,
            api_key_env: default_api_key_env(),
        }
    }
}

// ============= Store Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite file for the content store, or `:memory:`
    #[serde(default = "default_store_path")]
    pub path: String,
}

fn default_store_path() -> String {
    "./data/content.db".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

// ============= Scheduler Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Per-task deadline in seconds; 0 disables it
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,
}

fn default_max_workers() -> usize {
    4
}

fn default_task_timeout_secs() -> u64 {
    300
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            task_timeout_secs: default_task_timeout_secs(),
        }
    }
}

// ============= Research Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    #[serde(default = "default_min_content_length")]
    pub min_content_length: usize,

    #[serde(default = "default_tool_selection_attempts")]
    pub tool_selection_attempts: usize,

    #[serde(default = "default_max_followup_topics")]
    pub max_followup_topics: usize,

    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,

    /// Directory with `<prompt-id>.txt` overrides
    pub prompts_dir: Option<PathBuf>,
}

fn default_min_content_length() -> usize {
    500
}

fn default_tool_selection_attempts() -> usize {
    3
}

fn default_max_followup_topics() -> usize {
    5
}

fn default_max_content_chars() -> usize {
    8_000
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            min_content_length: default_min_content_length(),
            tool_selection_attempts: default_tool_selection_attempts(),
            max_followup_topics: default_max_followup_topics(),
            max_content_chars: default_max_content_chars(),
            prompts_dir: None,
        }
    }
}

// ============= Provider Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_num_results")]
    pub num_results: usize,
}

fn default_num_results() -> usize {
    10
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            num_results: default_num_results(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// 0 disables rate limiting
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
}

fn default_max_concurrency() -> usize {
    4
}

fn default_requests_per_second() -> u32 {
    5
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            requests_per_second: default_requests_per_second(),
        }
    }
}

// ============= Notes Index Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Defaults depend on the LLM provider
    pub embedding_model: Option<String>,

    #[serde(default = "default_collection")]
    pub collection: String,
}

fn default_collection() -> String {
    "research-notes".to_string()
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            embedding_model: None,
            collection: default_collection(),
        }
    }
}

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Environment variable '{0}' referenced in config is not set")]
    MissingEnvVar(String),
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

impl SleuthConfig {
    /// Load and validate configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate configuration text
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: SleuthConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "llm.model must not be empty".to_string(),
            ));
        }
        if self.llm.provider == LlmProviderKind::OpenAI && self.llm.api_key_env.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "llm.api_key_env must name an environment variable for the openai provider"
                    .to_string(),
            ));
        }
        if self.store.path.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "store.path must not be empty (use \":memory:\" for an in-memory store)"
                    .to_string(),
            ));
        }

        let at_least_one = [
            ("scheduler.max_workers", self.scheduler.max_workers),
            (
                "research.tool_selection_attempts",
                self.research.tool_selection_attempts,
            ),
            ("research.max_content_chars", self.research.max_content_chars),
            ("search.num_results", self.search.num_results),
            ("scrape.max_concurrency", self.scrape.max_concurrency),
        ];
        for (name, value) in at_least_one {
            if value == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "{} must be at least 1",
                    name
                )));
            }
        }

        if self.index.enabled && self.index.collection.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "index.collection must not be empty when the index is enabled".to_string(),
            ));
        }

        Ok(())
    }

    pub fn scheduler_settings(&self) -> SchedulerSettings {
        SchedulerSettings {
            max_workers: self.scheduler.max_workers,
            task_timeout: (self.scheduler.task_timeout_secs > 0)
                .then(|| Duration::from_secs(self.scheduler.task_timeout_secs)),
        }
    }

    pub fn research_settings(&self) -> ResearchSettings {
        ResearchSettings {
            min_content_length: self.research.min_content_length,
            tool_selection_attempts: self.research.tool_selection_attempts,
            max_followup_topics: self.research.max_followup_topics,
            max_content_chars: self.research.max_content_chars,
        }
    }

    pub fn store_provider(&self) -> StoreProvider {
        StoreProvider::from_path(&self.store.path)
    }

    pub fn base_url(&self) -> String {
        self.llm.base_url.clone().unwrap_or_else(|| match self.llm.provider {
            LlmProviderKind::Ollama => "http://localhost:11434".to_string(),
            LlmProviderKind::OpenAI => "https://api.openai.com/v1".to_string(),
        })
    }

    pub fn embedding_model(&self) -> String {
        self.index
            .embedding_model
            .clone()
            .unwrap_or_else(|| match self.llm.provider {
                LlmProviderKind::Ollama => "nomic-embed-text".to_string(),
                LlmProviderKind::OpenAI => "text-embedding-3-small".to_string(),
            })
    }

    /// Build the oracle provider, resolving the API key from the environment.
    pub fn provider(&self) -> Result<Provider, ConfigError> {
        match self.llm.provider {
            LlmProviderKind::Ollama => Ok(Provider::Ollama {
                base_url: self.base_url(),
                model: self.llm.model.clone(),
                embedding_model: self.embedding_model(),
            }),
            LlmProviderKind::OpenAI => {
                let api_key = std::env::var(&self.llm.api_key_env)
                    .map_err(|_| ConfigError::MissingEnvVar(self.llm.api_key_env.clone()))?;
                Ok(Provider::OpenAI {
                    api_key,
                    api_base: self.base_url(),
                    model: self.llm.model.clone(),
                    embedding_model: self.embedding_model(),
                })
            }
        }
    }
}
