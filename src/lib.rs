//! Prompter Gateway - real-time speech question/answer relay
//!
//! This library provides the core functionality for the prompter gateway:
//! - Audio transcoding (external ffmpeg) and speech recognition
//! - Deterministic text normalization for Chinese speech transcripts
//! - Similarity-based answer retrieval over a prepared knowledge base
//! - Answer relay to a single listener device
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                     Devices                          │
//! │     Speaker (audio in)   │   Listener (answers out)  │
//! └────────────────────┬────────────────────────────────┘
//!                      │ WebSocket
//! ┌────────────────────▼────────────────────────────────┐
//! │                Prompter Gateway                      │
//! │  Transcode │ Recognize │ Normalize │ Match │ Relay  │
//! └────────────────────┬────────────────────────────────┘
//!                      │ HTTP
//! ┌────────────────────▼────────────────────────────────┐
//! │        External backends (ffmpeg, ASR, embeddings)   │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod asr;
pub mod audio;
pub mod bridge;
pub mod cache;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod error;
pub mod matching;
pub mod pipeline;
pub mod relay;
pub mod session;
pub mod text;

pub use config::{Config, StrategyKind};
pub use corpus::{Corpus, KnowledgeEntry};
pub use error::{Error, Result};
pub use matching::{cosine_similarity, MatchEngine, MatchResult};
pub use pipeline::Pipeline;
pub use relay::ResultRelay;
pub use session::SessionRegistry;
pub use text::Normalizer;
