use crate::llm::client::LLMClient;
use crate::rag::Embedder;
use crate::types::{AppError, Result};
use async_trait::async_trait;
use ollama_rs::{
    generation::{
        chat::{request::ChatMessageRequest, ChatMessage},
        embeddings::request::GenerateEmbeddingsRequest,
    },
    Ollama,
};

pub struct OllamaClient {
    client: Ollama,
    model: String,
    embedding_model: String,
}

impl OllamaClient {
    pub async fn new(base_url: String, model: String, embedding_model: String) -> Result<Self> {
        let (host, port) = split_base_url(&base_url);
        let client = Ollama::new(host, port);

        Ok(Self {
            client,
            model,
            embedding_model,
        })
    }

    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<String> {
        let request = ChatMessageRequest::new(self.model.clone(), messages);

        let response = self
            .client
            .send_chat_messages(request)
            .await
            .map_err(|e| AppError::LLM(format!("Ollama error: {}", e)))?;

        Ok(response.message.content)
    }
}

/// Split `scheme://host:port` into the `(scheme://host, port)` pair that
/// `Ollama::new` expects. Falls back to localhost:11434.
fn split_base_url(base_url: &str) -> (String, u16) {
    match base_url.split_once("://") {
        Some((scheme, rest)) => {
            let rest = rest.trim_end_matches('/');
            match rest.rsplit_once(':') {
                Some((host, port)) => (
                    format!("{}://{}", scheme, host),
                    port.parse().unwrap_or(11434),
                ),
                None => (format!("{}://{}", scheme, rest), 11434),
            }
        }
        None => ("http://localhost".to_string(), 11434),
    }
}

#[async_trait]
impl LLMClient for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.chat(vec![ChatMessage::user(prompt.to_string())]).await
    }

    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        self.chat(vec![
            ChatMessage::system(system.to_string()),
            ChatMessage::user(prompt.to_string()),
        ])
        .await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Embedder for OllamaClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = GenerateEmbeddingsRequest::new(self.embedding_model.clone(), text.into());

        let response = self
            .client
            .generate_embeddings(request)
            .await
            .map_err(|e| AppError::LLM(format!("Ollama embedding error: {}", e)))?;

        response
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| AppError::LLM("Ollama returned no embedding".to_string()))
    }

    fn model_name(&self) -> &str {
        &self.embedding_model
    }
}
