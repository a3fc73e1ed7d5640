//! Result relay to the listener device
//!
//! Formats a match (or, optionally, its absence) and pushes it to whichever
//! listener is registered at delivery time. No listener means the result is
//! dropped on the floor — never queued, never retried; a listener that
//! reconnects later does not receive earlier results.

use std::sync::Arc;

use crate::matching::MatchResult;
use crate::session::SessionRegistry;

/// Delivers formatted answers to the current listener
pub struct ResultRelay {
    registry: Arc<SessionRegistry>,
    notify_on_miss: bool,
}

impl ResultRelay {
    /// Create a relay over the session registry
    #[must_use]
    pub fn new(registry: Arc<SessionRegistry>, notify_on_miss: bool) -> Self {
        Self {
            registry,
            notify_on_miss,
        }
    }

    /// Deliver a match to the current listener
    ///
    /// Returns whether a listener received the payload.
    pub async fn deliver(&self, result: &MatchResult) -> bool {
        self.send(format_answer(result)).await
    }

    /// Optionally tell the listener that nothing matched the transcript
    pub async fn deliver_miss(&self, transcript: &str) {
        if self.notify_on_miss {
            self.send(format!("未找到匹配答案: {transcript}")).await;
        }
    }

    async fn send(&self, payload: String) -> bool {
        let Some(listener) = self.registry.current_listener() else {
            tracing::debug!("no listener connected, dropping result");
            return false;
        };

        if listener.send(payload).await.is_err() {
            // Writer task already gone; the disconnect handler will
            // unregister the session.
            tracing::debug!("listener channel closed, dropping result");
            return false;
        }
        true
    }
}

/// Human-readable answer payload shown on the listener device
fn format_answer(result: &MatchResult) -> String {
    format!(
        "问题: {}\n\n答案: {}\n\n(相似度: {:.2})",
        result.question, result.answer, result.score
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn result() -> MatchResult {
        MatchResult {
            question: "你好吗".to_string(),
            answer: "我很好".to_string(),
            score: 0.873,
            matched_index: 0,
        }
    }

    #[test]
    fn answer_format() {
        let payload = format_answer(&result());
        assert_eq!(payload, "问题: 你好吗\n\n答案: 我很好\n\n(相似度: 0.87)");
    }

    #[tokio::test]
    async fn delivers_to_current_listener() {
        let registry = Arc::new(SessionRegistry::new());
        let (tx, mut rx) = mpsc::channel(4);
        registry.register_listener(tx);

        let relay = ResultRelay::new(Arc::clone(&registry), false);
        assert!(relay.deliver(&result()).await);
        assert!(rx.recv().await.unwrap().contains("我很好"));
    }

    #[tokio::test]
    async fn drops_without_listener() {
        let registry = Arc::new(SessionRegistry::new());
        let relay = ResultRelay::new(Arc::clone(&registry), false);
        assert!(!relay.deliver(&result()).await);

        // A listener connecting afterwards receives nothing retroactively
        let (tx, mut rx) = mpsc::channel(4);
        registry.register_listener(tx);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn miss_notice_respects_flag() {
        let registry = Arc::new(SessionRegistry::new());
        let (tx, mut rx) = mpsc::channel(4);
        registry.register_listener(tx);

        let silent = ResultRelay::new(Arc::clone(&registry), false);
        silent.deliver_miss("无关内容").await;
        assert!(rx.try_recv().is_err());

        let chatty = ResultRelay::new(Arc::clone(&registry), true);
        chatty.deliver_miss("无关内容").await;
        assert_eq!(rx.recv().await.unwrap(), "未找到匹配答案: 无关内容");
    }
}
