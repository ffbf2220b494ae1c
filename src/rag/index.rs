use crate::db::vectorstore::{VectorMatch, VectorRecord, VectorStore};
use crate::types::{AppError, Result, TaskResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Turns text into a dense vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn model_name(&self) -> &str;
}

/// Semantic index of finished task notes, kept beside the research run.
///
/// Writes are a side channel: callers spawn them and only log failures.
#[derive(Clone)]
pub struct NotesIndex {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    collection: String,
}

impl NotesIndex {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            embedder,
            store,
            collection: collection.into(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Embed a task's notes and upsert them under a fresh id.
    pub async fn index_notes(&self, result: &TaskResult) -> Result<String> {
        if result.notes.trim().is_empty() {
            return Err(AppError::InvalidInput(format!(
                "Task {} has no notes to index",
                result.id
            )));
        }

        let embedding = self.embedder.embed(&result.notes).await?;
        self.store
            .ensure_collection(&self.collection, embedding.len())
            .await?;

        let mut metadata = HashMap::new();
        metadata.insert("task_id".to_string(), result.id.clone());
        metadata.insert("topic".to_string(), result.topic.clone());
        metadata.insert("urls".to_string(), result.content_urls.join("\n"));

        let id = uuid::Uuid::new_v4().to_string();
        self.store
            .upsert(
                &self.collection,
                &[VectorRecord {
                    id: id.clone(),
                    text: result.notes.clone(),
                    metadata,
                    embedding,
                }],
            )
            .await?;

        tracing::debug!(task_id = %result.id, record_id = %id, "Notes indexed");
        Ok(id)
    }

    /// Notes most similar to `query`.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<VectorMatch>> {
        let embedding = self.embedder.embed(query).await?;
        if self.store.count(&self.collection).await? == 0 {
            return Ok(Vec::new());
        }
        self.store
            .search(&self.collection, &embedding, limit, 0.0)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::vectorstore::InMemoryVectorStore;

    /// Bag-of-letters embedding: good enough to make similar words score higher.
    struct LetterEmbedder;

    #[async_trait]
    impl Embedder for LetterEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let mut v = vec![0.0; 26];
            for c in text.to_ascii_lowercase().chars() {
                if c.is_ascii_lowercase() {
                    v[(c as u8 - b'a') as usize] += 1.0;
                }
            }
            Ok(v)
        }

        fn model_name(&self) -> &str {
            "letters"
        }
    }

    fn notes_result(id: &str, notes: &str) -> TaskResult {
        TaskResult {
            id: id.to_string(),
            topic: format!("topic {}", id),
            notes: notes.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_index_then_search() {
        let index = NotesIndex::new(
            Arc::new(LetterEmbedder),
            Arc::new(InMemoryVectorStore::new()),
            "notes",
        );

        index
            .index_notes(&notes_result("1", "- zebra zoo zigzag"))
            .await
            .unwrap();
        index
            .index_notes(&notes_result("2", "- apple banana"))
            .await
            .unwrap();

        let hits = index.search("zebras", 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.metadata["task_id"], "1");
    }

    #[tokio::test]
    async fn test_empty_notes_not_indexed() {
        let index = NotesIndex::new(
            Arc::new(LetterEmbedder),
            Arc::new(InMemoryVectorStore::new()),
            "notes",
        );
        assert!(index.index_notes(&notes_result("1", "  ")).await.is_err());
        assert!(index.search("anything", 5).await.unwrap().is_empty());
    }
}
