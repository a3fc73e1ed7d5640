//! Deterministic text normalization
//!
//! Turns raw recognized speech into a canonical query string: segment,
//! drop stop-words and single-character tokens, and rejoin without
//! separators. Purely functional over its inputs — a shared [`Normalizer`]
//! can be used from any number of tasks without synchronization.

use std::collections::HashSet;

use jieba_rs::Jieba;

/// Filler words stripped from recognized speech before matching
const STOP_WORDS: &[&str] = &[
    "的", "了", "呢", "啊", "哦", "嗯", "这个", "那个", "我想", "问一下",
    "请问", "就是", "然后", "其实", "对于", "吧", "呀", "哈", "么", "之后",
    "那么",
];

/// Cleans raw recognized text into a canonical query string
pub struct Normalizer {
    segmenter: Jieba,
    stop_words: HashSet<&'static str>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalizer {
    /// Create a normalizer with the built-in stop-word set
    #[must_use]
    pub fn new() -> Self {
        Self {
            segmenter: Jieba::new(),
            stop_words: STOP_WORDS.iter().copied().collect(),
        }
    }

    /// Normalize raw recognized text
    ///
    /// Strict pass drops stop-words and tokens of one character or less; if
    /// that removes everything, a loose pass keeps single characters so that
    /// short-but-meaningful input is not discarded. Retained tokens keep
    /// their original order and are joined with no separator.
    #[must_use]
    pub fn normalize(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return String::new();
        }

        let tokens = self.segmenter.cut(trimmed, false);

        let strict: Vec<&str> = tokens
            .iter()
            .map(|t| t.trim())
            .filter(|t| !self.stop_words.contains(t) && t.chars().count() > 1)
            .collect();

        let kept = if strict.is_empty() {
            // Loose pass: only stop-words are dropped
            tokens
                .iter()
                .map(|t| t.trim())
                .filter(|t| !t.is_empty() && !self.stop_words.contains(t))
                .collect()
        } else {
            strict
        };

        kept.concat()
    }

    /// Segment text into non-empty tokens (shared with the lexical strategy)
    #[must_use]
    pub fn tokenize<'a>(&'a self, text: &'a str) -> Vec<&'a str> {
        self.segmenter
            .cut(text.trim(), false)
            .into_iter()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect()
    }
}
