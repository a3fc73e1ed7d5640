//! Lexical matching strategy
//!
//! TF-IDF vectors over word and two-word-sequence features, vocabulary built
//! once from the corpus questions at load time and capped at a fixed feature
//! budget. Cheap enough that no durable cache is involved.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::corpus::Corpus;
use crate::text::Normalizer;
use crate::Result;

use super::{Strategy, StrategyIndex};

/// Feature budget mirroring the corpus vocabulary cap
pub const MAX_FEATURES: usize = 10_000;

/// TF-IDF unigram + bigram strategy
pub struct LexicalStrategy {
    normalizer: Arc<Normalizer>,
    threshold: f32,
}

impl LexicalStrategy {
    /// Create a lexical strategy sharing the pipeline's segmenter
    #[must_use]
    pub fn new(normalizer: Arc<Normalizer>, threshold: f32) -> Self {
        Self {
            normalizer,
            threshold,
        }
    }
}

#[async_trait]
impl Strategy for LexicalStrategy {
    fn id(&self) -> String {
        format!("lexical:tfidf-ngram12-{MAX_FEATURES}")
    }

    fn threshold(&self) -> f32 {
        self.threshold
    }

    async fn index(&self, corpus: &Corpus) -> Result<Box<dyn StrategyIndex>> {
        Ok(Box::new(LexicalIndex::build(
            Arc::clone(&self.normalizer),
            corpus,
        )))
    }
}

/// Per-corpus vocabulary, IDF weights, and question vectors
struct LexicalIndex {
    normalizer: Arc<Normalizer>,
    /// Feature term → vocabulary slot
    vocabulary: HashMap<String, usize>,
    /// Inverse document frequency per vocabulary slot
    idf: Vec<f32>,
    vectors: Vec<Vec<f32>>,
}

impl LexicalIndex {
    fn build(normalizer: Arc<Normalizer>, corpus: &Corpus) -> Self {
        let documents: Vec<Vec<String>> = corpus
            .entries()
            .iter()
            .map(|e| features(&normalizer, &e.question))
            .collect();

        // Collection frequency drives the feature cap; document frequency
        // drives IDF.
        let mut collection_freq: HashMap<&str, usize> = HashMap::new();
        let mut document_freq: HashMap<&str, usize> = HashMap::new();
        for doc in &documents {
            let mut seen: Vec<&str> = Vec::new();
            for term in doc {
                *collection_freq.entry(term).or_insert(0) += 1;
                if !seen.contains(&term.as_str()) {
                    seen.push(term.as_str());
                    *document_freq.entry(term).or_insert(0) += 1;
                }
            }
        }

        let mut ranked: Vec<(&str, usize)> = collection_freq.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(MAX_FEATURES);

        let vocabulary: HashMap<String, usize> = ranked
            .iter()
            .enumerate()
            .map(|(slot, (term, _))| ((*term).to_string(), slot))
            .collect();

        let total_docs = documents.len();
        let mut idf = vec![0.0_f32; vocabulary.len()];
        for (term, slot) in &vocabulary {
            let df = document_freq.get(term.as_str()).copied().unwrap_or(0);
            // Smoothed IDF, never zero so present terms always contribute
            idf[*slot] = (((1 + total_docs) as f32) / ((1 + df) as f32)).ln() + 1.0;
        }

        let vectors = documents
            .iter()
            .map(|doc| vectorize_features(doc, &vocabulary, &idf))
            .collect();

        tracing::debug!(
            vocabulary = vocabulary.len(),
            documents = total_docs,
            "lexical index built"
        );

        Self {
            normalizer,
            vocabulary,
            idf,
            vectors,
        }
    }
}

#[async_trait]
impl StrategyIndex for LexicalIndex {
    fn vectors(&self) -> &[Vec<f32>] {
        &self.vectors
    }

    async fn query_vector(&self, query: &str) -> Result<Vec<f32>> {
        let terms = features(&self.normalizer, query);
        Ok(vectorize_features(&terms, &self.vocabulary, &self.idf))
    }
}

/// Unigram + adjacent-bigram features over segmented tokens
fn features(normalizer: &Normalizer, text: &str) -> Vec<String> {
    let tokens = normalizer.tokenize(text);
    let mut out: Vec<String> = tokens.iter().map(ToString::to_string).collect();
    for pair in tokens.windows(2) {
        out.push(format!("{} {}", pair[0], pair[1]));
    }
    out
}

/// Term-frequency counts weighted by IDF; unknown terms are dropped
fn vectorize_features(
    terms: &[String],
    vocabulary: &HashMap<String, usize>,
    idf: &[f32],
) -> Vec<f32> {
    let mut vector = vec![0.0_f32; idf.len()];
    for term in terms {
        if let Some(&slot) = vocabulary.get(term) {
            vector[slot] += idf[slot];
        }
    }
    vector
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::KnowledgeEntry;
    use crate::matching::cosine_similarity;

    fn corpus(questions: &[&str]) -> Corpus {
        let entries = questions
            .iter()
            .map(|q| KnowledgeEntry {
                question: (*q).to_string(),
                answer: format!("answer to {q}"),
            })
            .collect();
        Corpus::new(entries).unwrap()
    }

    fn build(questions: &[&str]) -> LexicalIndex {
        LexicalIndex::build(Arc::new(Normalizer::new()), &corpus(questions))
    }

    #[test]
    fn one_vector_per_entry() {
        let index = build(&["你好吗", "你叫什么", "请做个自我介绍"]);
        assert_eq!(index.vectors().len(), 3);
    }

    #[tokio::test]
    async fn self_match_scores_highest() {
        let questions = ["请做个自我介绍", "你最大的优点是什么", "你为什么想加入我们公司"];
        let index = build(&questions);

        for (i, q) in questions.iter().enumerate() {
            let qv = index.query_vector(q).await.unwrap();
            let self_score = cosine_similarity(&qv, &index.vectors()[i]);
            assert!((self_score - 1.0).abs() < 1e-5, "self score for {q}: {self_score}");
            for (j, other) in index.vectors().iter().enumerate() {
                if i != j {
                    assert!(cosine_similarity(&qv, other) <= self_score);
                }
            }
        }
    }

    #[tokio::test]
    async fn unknown_terms_vectorize_to_zero() {
        let index = build(&["你好吗", "你叫什么"]);
        let qv = index.query_vector("completely unrelated english words").await.unwrap();
        assert!(qv.iter().all(|v| v.abs() < f32::EPSILON));
    }

    #[test]
    fn bigram_features_present() {
        let normalizer = Normalizer::new();
        let feats = features(&normalizer, "自我介绍一下");
        let has_bigram = feats.iter().any(|f| f.contains(' '));
        assert!(has_bigram, "expected at least one bigram in {feats:?}");
    }

    #[test]
    fn vocabulary_respects_feature_cap() {
        let index = build(&["你好吗", "你叫什么"]);
        assert!(index.vocabulary.len() <= MAX_FEATURES);
        assert_eq!(index.idf.len(), index.vocabulary.len());
    }

    #[tokio::test]
    async fn works_through_engine() {
        use crate::matching::MatchEngine;

        let strategy = LexicalStrategy::new(Arc::new(Normalizer::new()), 0.15);
        let engine = MatchEngine::new(
            Box::new(strategy),
            corpus(&["你好吗", "你叫什么"]),
            8,
            2,
        )
        .await
        .unwrap();

        let result = engine.match_query("你好吗").await.unwrap().unwrap();
        assert_eq!(result.matched_index, 0);
        assert!(result.score > 0.9);
    }
}
