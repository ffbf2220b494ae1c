//! Oracle clients.
//!
//! Every research decision (which providers to call, whether content is
//! sufficient, which documents to use, the notes themselves) goes through
//! the [`LLMClient`] trait. Providers are selected at runtime through
//! [`Provider`] and compiled in via Cargo features:
//! - `ollama` - Local Ollama server (default)
//! - `openai` - OpenAI API and compatible endpoints

/// Core LLM client trait and structured-output helpers.
pub mod client;

/// Ollama client.
#[cfg(feature = "ollama")]
pub mod ollama;

/// OpenAI client.
#[cfg(feature = "openai")]
pub mod openai;

pub use client::{extract_json_object, generate_structured, LLMClient, LLMResponse, Provider};
