//! Vector store for the semantic notes index.
//!
//! Only an in-memory backend ships; the trait is the seam for a persistent
//! one.

use crate::types::{AppError, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// An embedded piece of text plus free-form metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embedding: Vec<f32>,
}

/// A search hit. The record's embedding is not returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorMatch {
    pub record: VectorRecord,
    pub score: f32,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Get the name of this vector store provider.
    fn provider_name(&self) -> &'static str;

    /// Create the collection if it does not exist yet. Dimensions are fixed
    /// by the first call.
    async fn ensure_collection(&self, name: &str, dimensions: usize) -> Result<()>;

    /// Insert or replace records by id. Every embedding must match the
    /// collection's dimensions.
    async fn upsert(&self, collection: &str, records: &[VectorRecord]) -> Result<usize>;

    /// Most similar records first, at most `limit`, none scoring below
    /// `threshold`.
    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<VectorMatch>>;

    async fn count(&self, collection: &str) -> Result<usize>;
}

/// In-memory vector store using cosine similarity.
///
/// Data is not persisted and will be lost when the process exits.
pub struct InMemoryVectorStore {
    collections: Arc<RwLock<HashMap<String, InMemoryCollection>>>,
}

struct InMemoryCollection {
    dimensions: usize,
    records: HashMap<String, VectorRecord>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self {
            collections: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() {
            return 0.0;
        }

        let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }

        dot_product / (norm_a * norm_b)
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn provider_name(&self) -> &'static str {
        "in-memory"
    }

    async fn ensure_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        let mut collections = self.collections.write();
        if let Some(existing) = collections.get(name) {
            if existing.dimensions != dimensions {
                return Err(AppError::InvalidInput(format!(
                    "Collection '{}' has {} dimensions, got {}",
                    name, existing.dimensions, dimensions
                )));
            }
            return Ok(());
        }
        collections.insert(
            name.to_string(),
            InMemoryCollection {
                dimensions,
                records: HashMap::new(),
            },
        );
        Ok(())
    }

    async fn upsert(&self, collection: &str, records: &[VectorRecord]) -> Result<usize> {
        let mut collections = self.collections.write();
        let col = collections
            .get_mut(collection)
            .ok_or_else(|| AppError::NotFound(format!("Collection '{}' not found", collection)))?;

        for record in records {
            if record.embedding.len() != col.dimensions {
                return Err(AppError::InvalidInput(format!(
                    "Record '{}' has {} dimensions, collection expects {}",
                    record.id,
                    record.embedding.len(),
                    col.dimensions
                )));
            }
        }
        for record in records {
            col.records.insert(record.id.clone(), record.clone());
        }

        Ok(records.len())
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<VectorMatch>> {
        let collections = self.collections.read();
        let col = collections
            .get(collection)
            .ok_or_else(|| AppError::NotFound(format!("Collection '{}' not found", collection)))?;

        let mut results: Vec<VectorMatch> = col
            .records
            .values()
            .filter_map(|record| {
                let score = Self::cosine_similarity(embedding, &record.embedding);
                if score >= threshold {
                    Some(VectorMatch {
                        record: VectorRecord {
                            embedding: Vec::new(),
                            ..record.clone()
                        },
                        score,
                    })
                } else {
                    None
                }
            })
            .collect();

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(limit);

        Ok(results)
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let collections = self.collections.read();
        Ok(collections
            .get(collection)
            .map(|col| col.records.len())
            .unwrap_or(0))
    }
}
