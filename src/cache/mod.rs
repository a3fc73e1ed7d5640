//! Durable embedding cache
//!
//! Stores precomputed corpus vector sets on disk so expensive strategies
//! (semantic) survive process restarts. One JSON record per knowledge-base /
//! strategy pair; a record is only served when its corpus fingerprint and
//! strategy identity both match the live pair, and its vector count matches
//! the corpus length. Anything else is a miss and gets recomputed — stale
//! vectors are never returned.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Persisted vector set for one corpus/strategy pair
#[derive(Debug, Serialize, Deserialize)]
pub struct CacheRecord {
    /// Fingerprint of the corpus the vectors were computed from
    pub corpus_fingerprint: String,
    /// Identity of the strategy that produced the vectors
    pub strategy_id: String,
    /// One vector per corpus entry, in corpus order
    pub vectors: Vec<Vec<f32>>,
}

/// File-backed embedding cache
pub struct EmbeddingCache {
    dir: PathBuf,
    /// Knowledge-base identity, typically the file stem
    kb_id: String,
}

impl EmbeddingCache {
    /// Create a cache rooted at `dir` for the given knowledge-base identity
    ///
    /// # Errors
    ///
    /// Returns an error if the cache directory cannot be created
    pub fn new(dir: &Path, kb_id: &str) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .map_err(|e| Error::Cache(format!("cannot create {}: {e}", dir.display())))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            kb_id: sanitize(kb_id),
        })
    }

    /// Path of the record for a strategy
    fn record_path(&self, strategy_id: &str) -> PathBuf {
        self.dir
            .join(format!("{}-{}.vectors.json", self.kb_id, sanitize(strategy_id)))
    }

    /// Load a vector set, returning `None` on any kind of miss
    ///
    /// Misses: file absent, unreadable, fingerprint mismatch, strategy
    /// mismatch, or vector count differing from `expected_len`.
    #[must_use]
    pub fn load(
        &self,
        fingerprint: &str,
        strategy_id: &str,
        expected_len: usize,
    ) -> Option<Vec<Vec<f32>>> {
        let path = self.record_path(strategy_id);
        let raw = std::fs::read_to_string(&path).ok()?;
        let record: CacheRecord = match serde_json::from_str(&raw) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "unreadable cache record, recomputing");
                return None;
            }
        };

        if record.corpus_fingerprint != fingerprint || record.strategy_id != strategy_id {
            tracing::info!(
                path = %path.display(),
                "cache record does not match live corpus/strategy, recomputing"
            );
            return None;
        }

        if record.vectors.len() != expected_len {
            tracing::warn!(
                cached = record.vectors.len(),
                expected = expected_len,
                "cache record length mismatch, recomputing"
            );
            return None;
        }

        tracing::info!(
            strategy = strategy_id,
            vectors = record.vectors.len(),
            "loaded corpus vectors from cache"
        );
        Some(record.vectors)
    }

    /// Store a vector set, overwriting any previous record for this strategy
    ///
    /// The record is written to a temp file and renamed so readers never see
    /// a partial write.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be serialized or written
    pub fn store(
        &self,
        fingerprint: &str,
        strategy_id: &str,
        vectors: &[Vec<f32>],
    ) -> Result<()> {
        let record = CacheRecord {
            corpus_fingerprint: fingerprint.to_string(),
            strategy_id: strategy_id.to_string(),
            vectors: vectors.to_vec(),
        };

        let path = self.record_path(strategy_id);
        let tmp = path.with_extension("json.tmp");
        let raw = serde_json::to_string(&record)?;
        std::fs::write(&tmp, raw)
            .map_err(|e| Error::Cache(format!("cannot write {}: {e}", tmp.display())))?;
        std::fs::rename(&tmp, &path)
            .map_err(|e| Error::Cache(format!("cannot commit {}: {e}", path.display())))?;

        tracing::info!(
            strategy = strategy_id,
            vectors = vectors.len(),
            path = %path.display(),
            "corpus vectors cached"
        );
        Ok(())
    }
}

/// Keep identities filesystem-safe
fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
        .collect()
}
