//! Configuration management for the prompter gateway
//!
//! Supports a TOML config file as a partial overlay on top of defaults,
//! with environment variables filling in API keys.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{Error, Result};

/// Matching strategy selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// TF-IDF over word/bigram features, cosine similarity
    #[default]
    Lexical,
    /// Dense embeddings from the external embedder, cosine similarity
    Semantic,
}

/// Gateway configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Port to listen on
    pub port: u16,

    /// Path to the knowledge base file (CSV/TSV with question/answer columns)
    pub knowledge_base: PathBuf,

    /// Directory for durable state (embedding cache)
    pub cache_dir: PathBuf,

    /// Matching configuration
    pub matching: MatchingConfig,

    /// ASR backend configuration
    pub asr: AsrConfig,

    /// Embedding backend configuration (used by the semantic strategy)
    pub embedding: EmbeddingConfig,

    /// Explicit path to the ffmpeg binary; falls back to PATH lookup
    pub ffmpeg_path: Option<PathBuf>,

    /// API key guarding admin endpoints (from `PROMPTER_API_KEY`)
    pub api_key: Option<String>,
}

/// Matching engine configuration
#[derive(Debug, Clone)]
pub struct MatchingConfig {
    /// Active strategy
    pub strategy: StrategyKind,

    /// Similarity threshold for the lexical strategy
    pub lexical_threshold: f32,

    /// Similarity threshold for the semantic strategy
    pub semantic_threshold: f32,

    /// Capacity of the per-engine result cache
    pub result_cache_size: usize,

    /// Max concurrent CPU-bound scoring jobs
    pub scoring_workers: usize,

    /// Send a miss notice to the listener when nothing matches
    pub notify_listener_on_miss: bool,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::Lexical,
            lexical_threshold: 0.15,
            semantic_threshold: 0.6,
            result_cache_size: 64,
            scoring_workers: 4,
            notify_listener_on_miss: false,
        }
    }
}

/// ASR backend configuration
#[derive(Debug, Clone)]
pub struct AsrConfig {
    /// Transcription endpoint base URL
    pub base_url: Option<String>,

    /// API key for the transcription service
    pub api_key: Option<String>,

    /// Model identifier (e.g. "whisper-1")
    pub model: String,

    /// Transcription language hint
    pub language: Option<String>,
}

impl Default for AsrConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            model: "whisper-1".to_string(),
            language: Some("zh".to_string()),
        }
    }
}

/// Embedding backend configuration
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    /// Embeddings endpoint base URL
    pub base_url: String,

    /// API key for the embeddings service
    pub api_key: Option<String>,

    /// Model identifier
    pub model: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "text-embedding-3-small".to_string(),
        }
    }
}

/// Top-level TOML configuration file schema
///
/// All fields are optional — the file is a partial overlay on top of defaults.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    port: Option<u16>,
    #[serde(default)]
    knowledge_base: Option<PathBuf>,
    #[serde(default)]
    cache_dir: Option<PathBuf>,
    #[serde(default)]
    ffmpeg_path: Option<PathBuf>,
    #[serde(default)]
    matching: MatchingFileConfig,
    #[serde(default)]
    asr: AsrFileConfig,
    #[serde(default)]
    embedding: EmbeddingFileConfig,
}

#[derive(Debug, Default, Deserialize)]
struct MatchingFileConfig {
    strategy: Option<StrategyKind>,
    lexical_threshold: Option<f32>,
    semantic_threshold: Option<f32>,
    result_cache_size: Option<usize>,
    scoring_workers: Option<usize>,
    notify_listener_on_miss: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct AsrFileConfig {
    base_url: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    language: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct EmbeddingFileConfig {
    base_url: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
}

impl Config {
    /// Build a configuration from defaults, an optional TOML file, and env vars
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let file = match config_path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("cannot read {}: {e}", path.display()))
                })?;
                toml::from_str::<ConfigFile>(&raw)?
            }
            None => Self::read_default_file()?,
        };

        let cache_dir = file.cache_dir.unwrap_or_else(default_cache_dir);

        let mut matching = MatchingConfig::default();
        if let Some(s) = file.matching.strategy {
            matching.strategy = s;
        }
        if let Some(t) = file.matching.lexical_threshold {
            matching.lexical_threshold = t;
        }
        if let Some(t) = file.matching.semantic_threshold {
            matching.semantic_threshold = t;
        }
        if let Some(n) = file.matching.result_cache_size {
            matching.result_cache_size = n.max(1);
        }
        if let Some(n) = file.matching.scoring_workers {
            matching.scoring_workers = n.max(1);
        }
        if let Some(b) = file.matching.notify_listener_on_miss {
            matching.notify_listener_on_miss = b;
        }

        let mut asr = AsrConfig::default();
        asr.base_url = file.asr.base_url;
        if let Some(k) = file.asr.api_key.or_else(|| env_var("PROMPTER_ASR_API_KEY")) {
            asr.api_key = Some(k);
        }
        if let Some(m) = file.asr.model {
            asr.model = m;
        }
        if let Some(l) = file.asr.language {
            asr.language = Some(l);
        }

        let mut embedding = EmbeddingConfig::default();
        if let Some(u) = file.embedding.base_url {
            embedding.base_url = u;
        }
        if let Some(k) = file
            .embedding
            .api_key
            .or_else(|| env_var("PROMPTER_EMBEDDING_API_KEY"))
            .or_else(|| env_var("OPENAI_API_KEY"))
        {
            embedding.api_key = Some(k);
        }
        if let Some(m) = file.embedding.model {
            embedding.model = m;
        }

        Ok(Self {
            port: file.port.unwrap_or(8000),
            knowledge_base: file
                .knowledge_base
                .unwrap_or_else(|| PathBuf::from("knowledge_base.csv")),
            cache_dir,
            matching,
            asr,
            embedding,
            ffmpeg_path: file.ffmpeg_path,
            api_key: env_var("PROMPTER_API_KEY"),
        })
    }

    /// Read `~/.config/prompter/config.toml` if present
    fn read_default_file() -> Result<ConfigFile> {
        let Some(dirs) = directories::ProjectDirs::from("", "", "prompter") else {
            return Ok(ConfigFile::default());
        };
        let path = dirs.config_dir().join("config.toml");
        if !path.exists() {
            return Ok(ConfigFile::default());
        }
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Ok(toml::from_str(&raw)?)
    }

    /// Threshold for the currently configured strategy
    #[must_use]
    pub fn active_threshold(&self) -> f32 {
        match self.matching.strategy {
            StrategyKind::Lexical => self.matching.lexical_threshold,
            StrategyKind::Semantic => self.matching.semantic_threshold,
        }
    }
}

/// Default location for durable cache records
fn default_cache_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "prompter")
        .map_or_else(|| PathBuf::from(".prompter-cache"), |d| d.cache_dir().to_path_buf())
}

/// Read a non-empty environment variable
fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}
