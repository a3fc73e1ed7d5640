//! Semantic matching strategy
//!
//! Dense embedding vectors from the external embedder, with corpus vectors
//! served through the durable embedding cache. Vectorization is the
//! expensive path here, which is exactly why the cache exists.

use std::sync::Arc;

use async_trait::async_trait;

use crate::cache::EmbeddingCache;
use crate::corpus::Corpus;
use crate::embedding::Embedder;
use crate::Result;

use super::{Strategy, StrategyIndex};

/// Embedding-backed strategy
pub struct SemanticStrategy {
    embedder: Embedder,
    cache: Option<Arc<EmbeddingCache>>,
    threshold: f32,
}

impl SemanticStrategy {
    /// Create a semantic strategy; without a cache every index build embeds
    /// the full corpus
    #[must_use]
    pub fn new(embedder: Embedder, cache: Option<Arc<EmbeddingCache>>, threshold: f32) -> Self {
        Self {
            embedder,
            cache,
            threshold,
        }
    }
}

#[async_trait]
impl Strategy for SemanticStrategy {
    fn id(&self) -> String {
        format!("semantic:{}", self.embedder.model())
    }

    fn threshold(&self) -> f32 {
        self.threshold
    }

    async fn index(&self, corpus: &Corpus) -> Result<Box<dyn StrategyIndex>> {
        let strategy_id = self.id();
        let fingerprint = corpus.fingerprint();

        let vectors = if let Some(cached) = self
            .cache
            .as_ref()
            .and_then(|c| c.load(fingerprint, &strategy_id, corpus.len()))
        {
            cached
        } else {
            let questions: Vec<&str> = corpus
                .entries()
                .iter()
                .map(|e| e.question.as_str())
                .collect();
            tracing::info!(
                questions = questions.len(),
                "embedding corpus questions"
            );
            let vectors = self.embedder.embed_batch(&questions).await?;

            if let Some(cache) = &self.cache {
                // Cache write failures degrade to recompute-next-start
                if let Err(e) = cache.store(fingerprint, &strategy_id, &vectors) {
                    tracing::warn!(error = %e, "failed to persist corpus vectors");
                }
            }
            vectors
        };

        Ok(Box::new(SemanticIndex {
            embedder: self.embedder.clone(),
            vectors,
        }))
    }
}

/// Per-corpus embedding vectors plus the live embedder for queries
struct SemanticIndex {
    embedder: Embedder,
    vectors: Vec<Vec<f32>>,
}

#[async_trait]
impl StrategyIndex for SemanticIndex {
    fn vectors(&self) -> &[Vec<f32>] {
        &self.vectors
    }

    async fn query_vector(&self, query: &str) -> Result<Vec<f32>> {
        self.embedder.embed(query).await
    }
}
