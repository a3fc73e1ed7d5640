//! Knowledge base data model
//!
//! A corpus is an ordered, immutable set of question/answer pairs loaded from
//! a two-column tabular file. Order is significant: it drives deterministic
//! tie-breaks in the matching engine. Each corpus snapshot carries a content
//! fingerprint used to validate cached vector sets.

use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{Error, Result};

/// A single prepared question/answer pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub question: String,
    pub answer: String,
}

/// Ordered, immutable set of knowledge entries with a content fingerprint
#[derive(Debug, Clone)]
pub struct Corpus {
    entries: Vec<KnowledgeEntry>,
    fingerprint: String,
}

/// Raw CSV row shape; either column may be missing or empty
#[derive(Debug, Deserialize)]
struct RawRow {
    question: Option<String>,
    answer: Option<String>,
}

impl Corpus {
    /// Build a corpus from entries, computing the content fingerprint
    ///
    /// # Errors
    ///
    /// Returns an error if no entries remain after filtering
    pub fn new(entries: Vec<KnowledgeEntry>) -> Result<Self> {
        if entries.is_empty() {
            return Err(Error::Corpus("knowledge base has no valid entries".to_string()));
        }
        let fingerprint = fingerprint_of(&entries);
        Ok(Self { entries, fingerprint })
    }

    /// Load a corpus from a CSV or TSV file with `question`/`answer` columns
    ///
    /// Rows missing either value are skipped. The delimiter is inferred from
    /// the file extension (`.tsv` → tab, otherwise comma).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, the header lacks the
    /// required columns, or no valid rows remain
    pub fn load(path: &Path) -> Result<Self> {
        let delimiter = if path.extension().is_some_and(|e| e == "tsv") {
            b'\t'
        } else {
            b','
        };

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_path(path)
            .map_err(|e| Error::Corpus(format!("cannot open {}: {e}", path.display())))?;

        // Trim header names so padded columns still map onto the row shape
        let headers: csv::StringRecord = reader
            .headers()
            .map_err(|e| Error::Corpus(format!("unreadable header: {e}")))?
            .iter()
            .map(str::trim)
            .collect();
        for required in ["question", "answer"] {
            if !headers.iter().any(|h| h == required) {
                return Err(Error::Corpus(format!(
                    "knowledge base must contain a '{required}' column"
                )));
            }
        }
        reader.set_headers(headers);

        let mut entries = Vec::new();
        let mut skipped = 0_usize;
        for row in reader.deserialize::<RawRow>() {
            let row = row?;
            match (non_empty(row.question), non_empty(row.answer)) {
                (Some(question), Some(answer)) => entries.push(KnowledgeEntry { question, answer }),
                _ => skipped += 1,
            }
        }

        if skipped > 0 {
            tracing::warn!(skipped, "skipped knowledge base rows with missing values");
        }

        let corpus = Self::new(entries)?;
        tracing::info!(
            entries = corpus.len(),
            fingerprint = %&corpus.fingerprint()[..12],
            "knowledge base loaded"
        );
        Ok(corpus)
    }

    /// Entries in corpus order
    #[must_use]
    pub fn entries(&self) -> &[KnowledgeEntry] {
        &self.entries
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the corpus is empty (never true for a constructed corpus)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hex-encoded SHA-256 over all question/answer pairs
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Entry at the given index
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&KnowledgeEntry> {
        self.entries.get(index)
    }
}

/// Content hash over all entries, sensitive to order and to both columns
fn fingerprint_of(entries: &[KnowledgeEntry]) -> String {
    let mut hasher = Sha256::new();
    for entry in entries {
        hasher.update(entry.question.as_bytes());
        hasher.update([0x1f]);
        hasher.update(entry.answer.as_bytes());
        hasher.update([0x1e]);
    }
    hex::encode(hasher.finalize())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Write a small sample knowledge base for first-run setup
///
/// # Errors
///
/// Returns an error if the file cannot be written
pub fn write_sample(path: &Path) -> Result<()> {
    let samples = [
        ("请做个自我介绍", "您好，我是一名软件工程师，有多年的后端开发经验，熟悉分布式系统与实时服务。"),
        ("你为什么想加入我们公司", "我认同贵公司的技术方向，相信我的经验能够为团队创造价值，同时也能在这里继续成长。"),
        ("你最大的优点是什么", "学习能力强、责任心强，遇到新问题会主动查证并落地到可用的方案。"),
        ("你最大的缺点是什么", "有时对细节过于关注，正在学习在保证质量的前提下更合理地分配时间。"),
        ("你有什么问题要问我们的吗", "我想了解这个职位的日常工作内容、团队构成，以及公司对新人的培养计划。"),
    ];

    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| Error::Corpus(format!("cannot create {}: {e}", path.display())))?;
    writer
        .write_record(["question", "answer"])
        .map_err(Error::from)?;
    for (question, answer) in samples {
        writer.write_record([question, answer])?;
    }
    writer.flush()?;
    tracing::info!(path = %path.display(), rows = samples.len(), "sample knowledge base written");
    Ok(())
}
