//! Audio pipeline orchestrator
//!
//! One worker per speaker session drives a segment through
//! Converting → Recognizing → Normalizing → Matching → Relaying and back to
//! idle. Segments queue behind a bounded channel with exactly one in flight,
//! so a speaker's results always come back in arrival order while the
//! connection task stays free for heartbeats and disconnects. Failures are
//! scoped to the segment that caused them.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::asr::Recognizer;
use crate::audio::Transcoder;
use crate::matching::MatchEngine;
use crate::relay::ResultRelay;
use crate::text::Normalizer;

/// Queued segments per speaker beyond the one in flight
const SEGMENT_QUEUE_DEPTH: usize = 8;

/// One audio segment as received from a speaker connection
#[derive(Debug)]
pub struct AudioSegment {
    pub bytes: Vec<u8>,
}

/// Status frames sent back to the speaker connection
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SpeakerFrame {
    /// The segment was transcribed
    RecognitionResult { text: String },
    /// The transcript matched a knowledge entry
    MatchResult { question: String, similarity: f32 },
    /// Recognition or matching failed for this segment
    Error { message: String },
}

/// Processing stage, for log context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Converting,
    Recognizing,
    Normalizing,
    Matching,
    Relaying,
}

/// Shared pipeline dependencies, one instance per gateway
pub struct Pipeline {
    transcoder: Option<Transcoder>,
    recognizer: Option<Recognizer>,
    normalizer: Arc<Normalizer>,
    engine: Arc<MatchEngine>,
    relay: Arc<ResultRelay>,
}

/// Per-speaker ingress queue and worker
pub struct SpeakerPipeline {
    queue: mpsc::Sender<AudioSegment>,
    worker: JoinHandle<()>,
}

impl SpeakerPipeline {
    /// Enqueue a segment, applying backpressure when the queue is full
    ///
    /// Returns false once the worker has shut down.
    pub async fn submit(&self, segment: AudioSegment) -> bool {
        self.queue.send(segment).await.is_ok()
    }

    /// Cancel the worker, abandoning the in-flight and queued segments
    pub fn shutdown(self) {
        self.worker.abort();
    }
}

impl Pipeline {
    /// Assemble the pipeline from its collaborators
    ///
    /// Missing collaborators degrade gracefully: no transcoder drops
    /// segments silently, no recognizer surfaces an error frame per segment.
    #[must_use]
    pub fn new(
        transcoder: Option<Transcoder>,
        recognizer: Option<Recognizer>,
        normalizer: Arc<Normalizer>,
        engine: Arc<MatchEngine>,
        relay: Arc<ResultRelay>,
    ) -> Self {
        Self {
            transcoder,
            recognizer,
            normalizer,
            engine,
            relay,
        }
    }

    /// Whether an ASR backend is configured
    #[must_use]
    pub fn asr_loaded(&self) -> bool {
        self.recognizer.is_some()
    }

    /// Spawn the per-speaker worker
    ///
    /// `frames` feeds the speaker connection's writer task. The worker runs
    /// until the queue closes or [`SpeakerPipeline::shutdown`] aborts it.
    #[must_use]
    pub fn spawn_speaker_worker(
        self: &Arc<Self>,
        session: crate::session::SessionId,
        frames: mpsc::Sender<SpeakerFrame>,
    ) -> SpeakerPipeline {
        let (tx, mut rx) = mpsc::channel::<AudioSegment>(SEGMENT_QUEUE_DEPTH);
        let pipeline = Arc::clone(self);

        let worker = tokio::spawn(async move {
            while let Some(segment) = rx.recv().await {
                pipeline.process_segment(session, segment, &frames).await;
            }
            tracing::debug!(session_id = %session, "speaker worker stopped");
        });

        SpeakerPipeline { queue: tx, worker }
    }

    /// Run one segment through the full pipeline
    async fn process_segment(
        &self,
        session: crate::session::SessionId,
        segment: AudioSegment,
        frames: &mpsc::Sender<SpeakerFrame>,
    ) {
        tracing::debug!(
            session_id = %session,
            bytes = segment.bytes.len(),
            stage = ?Stage::Converting,
            "processing segment"
        );

        let Some(transcoder) = &self.transcoder else {
            tracing::warn!(session_id = %session, "transcoder unavailable, dropping segment");
            return;
        };
        let wav = match transcoder.to_wav(&segment.bytes).await {
            Ok(wav) => wav,
            Err(e) => {
                // Transcode failures drop the segment without a user-visible error
                tracing::warn!(session_id = %session, error = %e, "transcode failed, dropping segment");
                return;
            }
        };

        tracing::debug!(session_id = %session, stage = ?Stage::Recognizing, "segment converted");
        let Some(recognizer) = &self.recognizer else {
            let _ = frames
                .send(SpeakerFrame::Error {
                    message: "语音识别模型未加载".to_string(),
                })
                .await;
            return;
        };
        let transcript = match recognizer.recognize(&wav).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(session_id = %session, error = %e, "recognition failed");
                let _ = frames
                    .send(SpeakerFrame::Error {
                        message: format!("语音识别失败: {e}"),
                    })
                    .await;
                return;
            }
        };
        if transcript.is_empty() {
            let _ = frames
                .send(SpeakerFrame::Error {
                    message: "无法理解音频内容".to_string(),
                })
                .await;
            return;
        }

        let _ = frames
            .send(SpeakerFrame::RecognitionResult {
                text: transcript.clone(),
            })
            .await;

        self.process_transcript(session, &transcript, frames).await;
    }

    /// Text half of the pipeline: normalize, match, relay
    ///
    /// Split out so the matching path is exercisable without audio
    /// collaborators.
    pub async fn process_transcript(
        &self,
        session: crate::session::SessionId,
        transcript: &str,
        frames: &mpsc::Sender<SpeakerFrame>,
    ) {
        tracing::debug!(session_id = %session, stage = ?Stage::Normalizing, transcript, "normalizing");
        let query = self.normalizer.normalize(transcript);
        if query.is_empty() {
            tracing::debug!(session_id = %session, "normalized query empty, skipping match");
            return;
        }

        tracing::debug!(session_id = %session, stage = ?Stage::Matching, query = %query, "matching");
        match self.engine.match_query(&query).await {
            Ok(Some(result)) => {
                let _ = frames
                    .send(SpeakerFrame::MatchResult {
                        question: result.question.clone(),
                        similarity: result.score,
                    })
                    .await;

                tracing::debug!(session_id = %session, stage = ?Stage::Relaying, "delivering answer");
                let delivered = self.relay.deliver(&result).await;
                if delivered {
                    tracing::info!(
                        session_id = %session,
                        matched = %result.question,
                        score = result.score,
                        "answer relayed"
                    );
                }
            }
            Ok(None) => {
                tracing::info!(session_id = %session, query = %query, "no match above threshold");
                self.relay.deliver_miss(transcript).await;
            }
            Err(e) => {
                tracing::warn!(session_id = %session, error = %e, "matching failed");
                let _ = frames
                    .send(SpeakerFrame::Error {
                        message: format!("匹配失败: {e}"),
                    })
                    .await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{Corpus, KnowledgeEntry};
    use crate::matching::LexicalStrategy;
    use crate::session::SessionRegistry;

    async fn pipeline(registry: Arc<SessionRegistry>) -> Arc<Pipeline> {
        let normalizer = Arc::new(Normalizer::new());
        let corpus = Corpus::new(vec![
            KnowledgeEntry {
                question: "你好吗".to_string(),
                answer: "我很好".to_string(),
            },
            KnowledgeEntry {
                question: "你叫什么".to_string(),
                answer: "我是助手".to_string(),
            },
        ])
        .unwrap();
        let strategy = LexicalStrategy::new(Arc::clone(&normalizer), 0.15);
        let engine = Arc::new(
            MatchEngine::new(Box::new(strategy), corpus, 8, 2)
                .await
                .unwrap(),
        );
        let relay = Arc::new(ResultRelay::new(registry, false));
        Arc::new(Pipeline::new(None, None, normalizer, engine, relay))
    }

    fn session() -> crate::session::SessionId {
        SessionRegistry::new().register_speaker()
    }

    #[tokio::test]
    async fn transcript_match_emits_frame_and_relays() {
        let registry = Arc::new(SessionRegistry::new());
        let (listener_tx, mut listener_rx) = mpsc::channel(4);
        registry.register_listener(listener_tx);

        let pipeline = pipeline(Arc::clone(&registry)).await;
        let (frames_tx, mut frames_rx) = mpsc::channel(4);
        pipeline
            .process_transcript(session(), "你好吗", &frames_tx)
            .await;

        match frames_rx.recv().await.unwrap() {
            SpeakerFrame::MatchResult { question, similarity } => {
                assert_eq!(question, "你好吗");
                assert!(similarity > 0.15);
            }
            other => panic!("unexpected frame: {other:?}"),
        }
        assert!(listener_rx.recv().await.unwrap().contains("我很好"));
    }

    #[tokio::test]
    async fn unrelated_transcript_emits_nothing() {
        let registry = Arc::new(SessionRegistry::new());
        let (listener_tx, mut listener_rx) = mpsc::channel(4);
        registry.register_listener(listener_tx);

        let pipeline = pipeline(Arc::clone(&registry)).await;
        let (frames_tx, mut frames_rx) = mpsc::channel(4);
        pipeline
            .process_transcript(session(), "random tokens here", &frames_tx)
            .await;

        drop(frames_tx);
        assert!(frames_rx.recv().await.is_none());
        assert!(listener_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn stop_word_only_transcript_skips_matching() {
        let registry = Arc::new(SessionRegistry::new());
        let pipeline = pipeline(Arc::clone(&registry)).await;
        let (frames_tx, mut frames_rx) = mpsc::channel(4);

        pipeline.process_transcript(session(), "嗯啊哦", &frames_tx).await;

        drop(frames_tx);
        assert!(frames_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn missing_transcoder_drops_segment_silently() {
        let registry = Arc::new(SessionRegistry::new());
        let pipeline = pipeline(Arc::clone(&registry)).await;
        let (frames_tx, mut frames_rx) = mpsc::channel(4);

        let worker = pipeline.spawn_speaker_worker(session(), frames_tx);
        assert!(
            worker
                .submit(AudioSegment {
                    bytes: vec![0_u8; 64]
                })
                .await
        );

        // Close the queue so the worker drains and exits; no frame may have
        // been produced for the dropped segment.
        drop(worker.queue);
        let _ = worker.worker.await;
        assert!(frames_rx.recv().await.is_none());
    }

    #[test]
    fn speaker_frames_serialize_with_type_tag() {
        let frame = SpeakerFrame::RecognitionResult {
            text: "你好".to_string(),
        };
        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains("\"type\":\"recognition_result\""));

        let frame = SpeakerFrame::MatchResult {
            question: "你好吗".to_string(),
            similarity: 0.8,
        };
        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains("\"type\":\"match_result\""));

        let frame = SpeakerFrame::Error {
            message: "x".to_string(),
        };
        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains("\"type\":\"error\""));
    }
}
