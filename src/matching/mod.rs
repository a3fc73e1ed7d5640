//! Similarity-based answer retrieval
//!
//! The engine is written once against the [`Strategy`] interface; a strategy
//! turns the corpus questions and incoming queries into comparable vectors,
//! and the engine does cosine scoring, deterministic tie-breaking, threshold
//! acceptance, and result caching on top.

pub mod lexical;
pub mod semantic;

pub use lexical::LexicalStrategy;
pub use semantic::SemanticStrategy;

use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use lru::LruCache;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock, Semaphore};

use crate::corpus::Corpus;
use crate::{Error, Result};

/// A match above the strategy threshold
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub question: String,
    pub answer: String,
    /// Cosine similarity in `[0, 1]` for non-degenerate vectors
    pub score: f32,
    /// Index of the matched entry in corpus order
    pub matched_index: usize,
}

/// Pluggable similarity strategy
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Stable identity used for cache keying (changes when the vector space
    /// would change, e.g. a different embedding model)
    fn id(&self) -> String;

    /// Minimum similarity for a match; scores equal to the threshold do not
    /// match
    fn threshold(&self) -> f32;

    /// Build the per-corpus index: question vectors plus whatever state is
    /// needed to vectorize queries against them
    async fn index(&self, corpus: &Corpus) -> Result<Box<dyn StrategyIndex>>;
}

/// Per-corpus state produced by a strategy
#[async_trait]
pub trait StrategyIndex: Send + Sync {
    /// One vector per corpus entry, in corpus order
    fn vectors(&self) -> &[Vec<f32>];

    /// Vectorize a normalized query into the same space
    async fn query_vector(&self, query: &str) -> Result<Vec<f32>>;
}

/// Immutable corpus/vectors snapshot, swapped wholesale on reload
struct LoadedIndex {
    corpus: Arc<Corpus>,
    index: Box<dyn StrategyIndex>,
}

/// Corpus statistics for the status endpoint
#[derive(Debug, Clone, Copy, Serialize)]
pub struct EngineStats {
    /// Number of knowledge entries
    pub total_questions: usize,
    /// Vocabulary size (lexical) or embedding dimension (semantic)
    pub vector_dimension: usize,
}

/// Matching engine parameterized by a strategy
pub struct MatchEngine {
    strategy: Box<dyn Strategy>,
    loaded: RwLock<Arc<LoadedIndex>>,
    /// Bounded memo of recent outcomes keyed by normalized query
    result_cache: Mutex<LruCache<String, Option<MatchResult>>>,
    /// Bounds concurrent CPU-bound scoring jobs
    scoring: Arc<Semaphore>,
}

impl MatchEngine {
    /// Build an engine over a corpus, computing the strategy index up front
    ///
    /// # Errors
    ///
    /// Returns an error if the strategy cannot build its index (e.g. the
    /// embedding backend is unreachable) or the index length does not match
    /// the corpus
    pub async fn new(
        strategy: Box<dyn Strategy>,
        corpus: Corpus,
        result_cache_size: usize,
        scoring_workers: usize,
    ) -> Result<Self> {
        let loaded = Self::build_index(strategy.as_ref(), corpus).await?;
        let cache_size = NonZeroUsize::new(result_cache_size.max(1))
            .unwrap_or(NonZeroUsize::MIN);

        Ok(Self {
            strategy,
            loaded: RwLock::new(Arc::new(loaded)),
            result_cache: Mutex::new(LruCache::new(cache_size)),
            scoring: Arc::new(Semaphore::new(scoring_workers.max(1))),
        })
    }

    async fn build_index(strategy: &dyn Strategy, corpus: Corpus) -> Result<LoadedIndex> {
        let index = strategy.index(&corpus).await?;
        if index.vectors().len() != corpus.len() {
            return Err(Error::Corpus(format!(
                "strategy '{}' produced {} vectors for {} entries",
                strategy.id(),
                index.vectors().len(),
                corpus.len()
            )));
        }
        Ok(LoadedIndex {
            corpus: Arc::new(corpus),
            index,
        })
    }

    /// Replace the corpus wholesale
    ///
    /// The new snapshot is built first, then published atomically; the
    /// result cache is cleared under the same write lock so no caller ever
    /// observes a pre-reload outcome against the new corpus.
    ///
    /// # Errors
    ///
    /// Returns an error if the new index cannot be built; the previous
    /// corpus stays live in that case
    pub async fn reload(&self, corpus: Corpus) -> Result<()> {
        let entries = corpus.len();
        let next = Self::build_index(self.strategy.as_ref(), corpus).await?;

        let mut loaded = self.loaded.write().await;
        *loaded = Arc::new(next);
        self.result_cache.lock().await.clear();
        drop(loaded);

        tracing::info!(entries, "corpus reloaded");
        Ok(())
    }

    /// Match a normalized query against the corpus
    ///
    /// Returns `None` for empty queries and for best scores at or below the
    /// strategy threshold. Repeated identical queries are served from the
    /// bounded result cache.
    ///
    /// # Errors
    ///
    /// Returns an error if query vectorization fails
    pub async fn match_query(&self, query: &str) -> Result<Option<MatchResult>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(None);
        }

        if let Some(cached) = self.result_cache.lock().await.get(query) {
            tracing::debug!(query, "result cache hit");
            return Ok(cached.clone());
        }

        let snapshot = { Arc::clone(&*self.loaded.read().await) };
        let query_vec = snapshot.index.query_vector(query).await?;
        let threshold = self.strategy.threshold();

        // Scoring is CPU-bound; keep it off the I/O tasks and bounded.
        let permit = self
            .scoring
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| Error::Session("scoring pool closed".to_string()))?;
        let scored = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let best = best_match(&query_vec, snapshot.index.vectors());
            (snapshot, best)
        })
        .await
        .map_err(|e| Error::Session(format!("scoring task failed: {e}")))?;

        let (snapshot, best) = scored;
        let outcome = best.and_then(|(index, score)| {
            let entry = snapshot.corpus.get(index)?;
            tracing::info!(
                query,
                matched = %entry.question,
                score,
                threshold,
                "scored best candidate"
            );
            (score > threshold).then(|| MatchResult {
                question: entry.question.clone(),
                answer: entry.answer.clone(),
                score,
                matched_index: index,
            })
        });

        // A reload may have landed while this query was in flight; only
        // memoize outcomes computed against the still-live snapshot. The
        // read lock is held across the insert so a concurrent reload cannot
        // clear the cache between the check and the put.
        {
            let loaded = self.loaded.read().await;
            if Arc::ptr_eq(&snapshot, &*loaded) {
                self.result_cache
                    .lock()
                    .await
                    .put(query.to_string(), outcome.clone());
            } else {
                tracing::debug!(query, "corpus reloaded mid-query, outcome not cached");
            }
        }

        Ok(outcome)
    }

    /// Corpus statistics for the status surface
    pub async fn stats(&self) -> EngineStats {
        let loaded = self.loaded.read().await;
        EngineStats {
            total_questions: loaded.corpus.len(),
            vector_dimension: loaded.index.vectors().first().map_or(0, Vec::len),
        }
    }

    /// Active strategy identity
    #[must_use]
    pub fn strategy_id(&self) -> String {
        self.strategy.id()
    }
}

/// Index and score of the best-scoring vector
///
/// Ties on the maximum score resolve to the lowest index: only a strictly
/// greater score displaces the current best.
fn best_match(query: &[f32], vectors: &[Vec<f32>]) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (index, vector) in vectors.iter().enumerate() {
        let score = cosine_similarity(query, vector);
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((index, score)),
        }
    }
    best
}

/// Compute cosine similarity between two vectors
///
/// Returns 0.0 if either vector has zero magnitude or the lengths differ
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0_f32;
    let mut norm_a = 0.0_f32;
    let mut norm_b = 0.0_f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::KnowledgeEntry;

    /// Strategy with hand-constructed vectors for deterministic tests
    struct FixedStrategy {
        vectors: Vec<Vec<f32>>,
        query: Vec<f32>,
        threshold: f32,
    }

    struct FixedIndex {
        vectors: Vec<Vec<f32>>,
        query: Vec<f32>,
    }

    #[async_trait]
    impl Strategy for FixedStrategy {
        fn id(&self) -> String {
            "fixed".to_string()
        }

        fn threshold(&self) -> f32 {
            self.threshold
        }

        async fn index(&self, corpus: &Corpus) -> Result<Box<dyn StrategyIndex>> {
            // Repeat the first vector when the corpus outgrows the fixture,
            // so reload tests can swap in a differently-sized corpus.
            let vectors = if self.vectors.len() == corpus.len() {
                self.vectors.clone()
            } else {
                vec![self.vectors[0].clone(); corpus.len()]
            };
            Ok(Box::new(FixedIndex {
                vectors,
                query: self.query.clone(),
            }))
        }
    }

    #[async_trait]
    impl StrategyIndex for FixedIndex {
        fn vectors(&self) -> &[Vec<f32>] {
            &self.vectors
        }

        async fn query_vector(&self, _query: &str) -> Result<Vec<f32>> {
            Ok(self.query.clone())
        }
    }

    fn corpus(n: usize) -> Corpus {
        let entries = (0..n)
            .map(|i| KnowledgeEntry {
                question: format!("q{i}"),
                answer: format!("a{i}"),
            })
            .collect();
        Corpus::new(entries).unwrap()
    }

    async fn engine(vectors: Vec<Vec<f32>>, query: Vec<f32>, threshold: f32) -> MatchEngine {
        let n = vectors.len();
        let strategy = FixedStrategy {
            vectors,
            query,
            threshold,
        };
        MatchEngine::new(Box::new(strategy), corpus(n), 8, 2)
            .await
            .unwrap()
    }

    #[test]
    fn cosine_identical() {
        let a = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn cosine_orthogonal() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < f32::EPSILON);
    }

    #[test]
    fn cosine_zero_vector_and_length_mismatch() {
        assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).abs() < f32::EPSILON);
        assert!(cosine_similarity(&[1.0], &[1.0, 0.0]).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn empty_query_is_no_match() {
        let engine = engine(vec![vec![1.0, 0.0]], vec![1.0, 0.0], 0.1).await;
        assert!(engine.match_query("").await.unwrap().is_none());
        assert!(engine.match_query("   ").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn tie_break_selects_lowest_index() {
        // Both entries identical to the query: equal scores, index 0 wins.
        let engine = engine(
            vec![vec![1.0, 0.0], vec![1.0, 0.0]],
            vec![1.0, 0.0],
            0.1,
        )
        .await;
        let result = engine.match_query("tie").await.unwrap().unwrap();
        assert_eq!(result.matched_index, 0);
        assert_eq!(result.question, "q0");
    }

    #[tokio::test]
    async fn score_equal_to_threshold_does_not_match() {
        // cos(60°) = 0.5 exactly against the first axis
        let engine = engine(
            vec![vec![0.5, 3.0_f32.sqrt() / 2.0]],
            vec![1.0, 0.0],
            0.5,
        )
        .await;
        assert!(engine.match_query("boundary").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn score_above_threshold_matches() {
        let engine = engine(vec![vec![1.0, 0.0]], vec![1.0, 0.1], 0.5).await;
        let result = engine.match_query("hit").await.unwrap().unwrap();
        assert_eq!(result.matched_index, 0);
        assert!(result.score > 0.5);
    }

    #[tokio::test]
    async fn highest_score_wins() {
        let engine = engine(
            vec![vec![0.0, 1.0], vec![1.0, 0.2], vec![0.5, 0.5]],
            vec![1.0, 0.0],
            0.1,
        )
        .await;
        let result = engine.match_query("best").await.unwrap().unwrap();
        assert_eq!(result.matched_index, 1);
    }

    #[tokio::test]
    async fn reload_clears_result_cache() {
        let engine = engine(vec![vec![1.0, 0.0]], vec![1.0, 0.0], 0.1).await;
        let first = engine.match_query("repeat").await.unwrap();
        assert!(first.is_some());

        // Two entries after reload; the fixed query still scores 1.0 against
        // both, so the cached single-entry outcome must not be served.
        let entries = vec![
            KnowledgeEntry {
                question: "new0".to_string(),
                answer: "n0".to_string(),
            },
            KnowledgeEntry {
                question: "new1".to_string(),
                answer: "n1".to_string(),
            },
        ];
        engine.reload(Corpus::new(entries).unwrap()).await.unwrap();

        let after = engine.match_query("repeat").await.unwrap().unwrap();
        assert_eq!(after.question, "new0");
        assert_eq!(engine.stats().await.total_questions, 2);
    }

    /// Strategy whose query vectorization can be held open mid-flight
    struct GatedStrategy {
        gate: Arc<Semaphore>,
        entered: tokio::sync::mpsc::UnboundedSender<()>,
    }

    struct GatedIndex {
        vectors: Vec<Vec<f32>>,
        gate: Arc<Semaphore>,
        entered: tokio::sync::mpsc::UnboundedSender<()>,
    }

    #[async_trait]
    impl Strategy for GatedStrategy {
        fn id(&self) -> String {
            "gated".to_string()
        }

        fn threshold(&self) -> f32 {
            0.1
        }

        async fn index(&self, corpus: &Corpus) -> Result<Box<dyn StrategyIndex>> {
            Ok(Box::new(GatedIndex {
                vectors: vec![vec![1.0]; corpus.len()],
                gate: Arc::clone(&self.gate),
                entered: self.entered.clone(),
            }))
        }
    }

    #[async_trait]
    impl StrategyIndex for GatedIndex {
        fn vectors(&self) -> &[Vec<f32>] {
            &self.vectors
        }

        async fn query_vector(&self, _query: &str) -> Result<Vec<f32>> {
            let _ = self.entered.send(());
            let permit = self
                .gate
                .acquire()
                .await
                .map_err(|_| Error::Session("gate closed".to_string()))?;
            permit.forget();
            Ok(vec![1.0])
        }
    }

    fn named_corpus(questions: &[&str]) -> Corpus {
        let entries = questions
            .iter()
            .map(|q| KnowledgeEntry {
                question: (*q).to_string(),
                answer: format!("answer to {q}"),
            })
            .collect();
        Corpus::new(entries).unwrap()
    }

    #[tokio::test]
    async fn query_in_flight_across_reload_does_not_poison_cache() {
        let gate = Arc::new(Semaphore::new(0));
        let (entered_tx, mut entered_rx) = tokio::sync::mpsc::unbounded_channel();
        let strategy = GatedStrategy {
            gate: Arc::clone(&gate),
            entered: entered_tx,
        };
        let engine = Arc::new(
            MatchEngine::new(Box::new(strategy), named_corpus(&["old"]), 8, 2)
                .await
                .unwrap(),
        );

        // Park a query inside vectorization, against the pre-reload snapshot
        let in_flight = tokio::spawn({
            let engine = Arc::clone(&engine);
            async move { engine.match_query("q").await }
        });
        entered_rx.recv().await.unwrap();

        // Swap the corpus while that query is still in flight
        engine
            .reload(named_corpus(&["new0", "new1"]))
            .await
            .unwrap();

        // The parked query completes against the old snapshot
        gate.add_permits(1);
        let stale = in_flight.await.unwrap().unwrap().unwrap();
        assert_eq!(stale.question, "old");

        // Repeating the query must hit the new corpus, not a memo of the
        // pre-reload outcome
        gate.add_permits(1);
        let fresh = engine.match_query("q").await.unwrap().unwrap();
        assert_eq!(fresh.question, "new0");
    }

    #[tokio::test]
    async fn stats_reports_dimension() {
        let engine = engine(vec![vec![1.0, 0.0, 0.0]], vec![1.0, 0.0, 0.0], 0.1).await;
        let stats = engine.stats().await;
        assert_eq!(stats.total_questions, 1);
        assert_eq!(stats.vector_dimension, 3);
    }
}
