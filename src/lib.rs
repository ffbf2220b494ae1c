//! # sleuth
//!
//! A research engine that answers a question by running a plan of
//! sub-questions as a dependency graph. Independent sub-questions run
//! concurrently; dependent ones start as soon as what they build on is done
//! and inherit the content it selected. All gathered documents go through a
//! shared content store keyed by URL, so a page is scraped once per run no
//! matter how many tasks find it.
//!
//! ## Quick Start (Library Usage)
//!
//! ```rust,ignore
//! use sleuth::db::ContentStore;
//! use sleuth::research::{ResearchContext, ResearchRunner, SchedulerSettings, TaskScheduler};
//! use sleuth::tools::{PageScraper, ToolRegistry};
//! use sleuth::{Provider, ResearchPlan};
//! use std::sync::Arc;
//!
//! let oracle = Provider::Ollama {
//!     base_url: "http://localhost:11434".to_string(),
//!     model: "llama3.2".to_string(),
//!     embedding_model: "nomic-embed-text".to_string(),
//! }
//! .create_client()
//! .await?;
//!
//! let ctx = ResearchContext::new(
//!     oracle,
//!     Arc::new(ToolRegistry::with_web_search(10)),
//!     Arc::new(PageScraper::default()),
//!     Arc::new(ContentStore::new_memory().await?),
//! );
//! let scheduler = TaskScheduler::new(
//!     Arc::new(ResearchRunner::new(Arc::new(ctx))),
//!     SchedulerSettings::default(),
//! );
//!
//! let plan = ResearchPlan::from_json(&std::fs::read_to_string("plan.json")?)?;
//! let results = scheduler.run(plan.to_tasks()).await?;
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `ollama` | Ollama local inference (default) |
//! | `openai` | OpenAI API support |
//!
//! ## Modules
//!
//! - [`research`] - Dependency graph, scheduler and research protocol
//! - [`db`] - Content store and vector store
//! - [`llm`] - Oracle clients
//! - [`tools`] - Content providers and scraping
//! - [`rag`] - Optional semantic index over notes
//! - [`types`] - Common types and error handling
//! - [`utils`] - Configuration

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

/// Command-line interface.
pub mod cli;
/// Content store and vector store.
pub mod db;
/// Oracle clients.
pub mod llm;
/// Semantic index over finished notes.
pub mod rag;
/// Dependency graph, scheduler and research protocol.
pub mod research;
/// Content providers and scraping.
pub mod tools;
/// Core types and errors.
pub mod types;
/// Configuration.
pub mod utils;

// Re-export commonly used types
pub use db::ContentStore;
pub use llm::{LLMClient, LLMResponse, Provider};
pub use research::{ResearchContext, ResearchRunner, TaskScheduler};
pub use tools::ToolRegistry;
pub use types::{AppError, ResearchPlan, ResearchReport, Result, Task, TaskResult};
pub use utils::{ConfigError, SleuthConfig};
