//! Shared test utilities

use std::sync::Arc;

use prompter_gateway::matching::LexicalStrategy;
use prompter_gateway::pipeline::Pipeline;
use prompter_gateway::relay::ResultRelay;
use prompter_gateway::{Corpus, KnowledgeEntry, MatchEngine, Normalizer, SessionRegistry};

/// Interview-style corpus used across the integration tests
#[must_use]
pub fn sample_corpus() -> Corpus {
    let entries = vec![
        ("你好吗", "我很好"),
        ("请做个自我介绍", "我是一名软件工程师"),
        ("你最大的优点是什么", "学习能力强"),
    ]
    .into_iter()
    .map(|(q, a)| KnowledgeEntry {
        question: q.to_string(),
        answer: a.to_string(),
    })
    .collect();
    Corpus::new(entries).expect("sample corpus")
}

/// Lexical engine over the sample corpus at the default threshold
pub async fn sample_engine(normalizer: &Arc<Normalizer>) -> Arc<MatchEngine> {
    let strategy = LexicalStrategy::new(Arc::clone(normalizer), 0.15);
    Arc::new(
        MatchEngine::new(Box::new(strategy), sample_corpus(), 16, 2)
            .await
            .expect("sample engine"),
    )
}

/// Full pipeline with no audio collaborators, for transcript-level tests
pub async fn sample_pipeline(
    registry: &Arc<SessionRegistry>,
    notify_on_miss: bool,
) -> (Arc<Pipeline>, Arc<MatchEngine>) {
    let normalizer = Arc::new(Normalizer::new());
    let engine = sample_engine(&normalizer).await;
    let relay = Arc::new(ResultRelay::new(Arc::clone(registry), notify_on_miss));
    let pipeline = Arc::new(Pipeline::new(
        None,
        None,
        normalizer,
        Arc::clone(&engine),
        relay,
    ));
    (pipeline, engine)
}
