//! The experts that actually answer questions.
//!
//! Two families share one trait. RAG-backed experts ([`HardwareDocsExpert`],
//! [`GeneralExpert`]) retrieve document chunks and hand them to a chat model;
//! live-API experts ([`InventoryExpert`], [`FabricExpert`]) query a backend
//! service and format what it returns. The pipeline only sees the [`Expert`]
//! trait, so a failing expert can be retried on a different one without
//! special cases.

pub mod fabric;
pub mod general;
pub mod hardware_docs;
pub mod inventory;

use std::sync::Arc;

use async_trait::async_trait;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::answer::AnswerResult;
use crate::docstore::{RetrievedChunk, StoreError};
use crate::embedding::EmbeddingError;
use crate::event_bus::{Event, ModelEvent};
use crate::message::Message;
use crate::model::ChatError;
use crate::tools::ToolError;
use crate::types::{ExpertCapability, ExpertKind};

pub use fabric::FabricExpert;
pub use general::GeneralExpert;
pub use hardware_docs::{DEFAULT_CONTEXT_BUDGET, HardwareDocsExpert};
pub use inventory::InventoryExpert;

/// Why an expert could not produce an answer.
///
/// Every variant is treated the same way upstream: the turn falls back to
/// the next candidate expert. The distinction matters for diagnostics, not
/// control flow.
#[derive(Debug, Error, Diagnostic)]
pub enum ExpertError {
    #[error("chat model failed: {0}")]
    #[diagnostic(code(switchboard::experts::model))]
    Model(#[from] ChatError),

    #[error("live api failed: {0}")]
    #[diagnostic(code(switchboard::experts::tool))]
    Tool(#[from] ToolError),

    #[error("retrieval failed: {0}")]
    #[diagnostic(code(switchboard::experts::retrieval))]
    Retrieval(#[from] StoreError),

    #[error("query embedding failed: {0}")]
    #[diagnostic(code(switchboard::experts::embedding))]
    Embedding(#[from] EmbeddingError),
}

/// Per-turn context handed to an expert: who is asking and where to send
/// progress events.
///
/// Event emission is best-effort. A missing or closed listener means the
/// pipeline is shutting down, and an answer in flight should still complete.
#[derive(Clone)]
pub struct ExpertContext {
    session_id: String,
    turn: u64,
    events: Option<flume::Sender<Event>>,
}

impl ExpertContext {
    pub fn new(
        session_id: impl Into<String>,
        turn: u64,
        events: flume::Sender<Event>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            turn,
            events: Some(events),
        }
    }

    /// A context with no event channel, for direct expert calls in tests.
    pub fn detached(session_id: impl Into<String>, turn: u64) -> Self {
        Self {
            session_id: session_id.into(),
            turn,
            events: None,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn turn(&self) -> u64 {
        self.turn
    }

    pub fn emit(&self, event: Event) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }

    /// Emit a stage event scoped and tagged with `stage`.
    pub fn emit_stage(&self, stage: &str, message: impl Into<String>) {
        self.emit(Event::stage_message_with_meta(stage, self.turn, stage, message));
    }

    pub fn emit_model(&self, event: ModelEvent) {
        self.emit(Event::Model(event));
    }
}

/// One answering strategy behind the router.
#[async_trait]
pub trait Expert: Send + Sync {
    /// Which routing target this expert serves.
    fn kind(&self) -> ExpertKind;

    /// How the expert produces answers.
    fn capability(&self) -> ExpertCapability;

    /// Answer `query` given the session history so far.
    async fn answer(
        &self,
        query: &str,
        history: &[Message],
        ctx: &ExpertContext,
    ) -> Result<AnswerResult, ExpertError>;
}

/// The experts available to the pipeline, keyed by kind.
#[derive(Default)]
pub struct ExpertRegistry {
    experts: FxHashMap<ExpertKind, Arc<dyn Expert>>,
}

impl ExpertRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an expert under its own kind, replacing any previous one.
    #[must_use]
    pub fn register(mut self, expert: Arc<dyn Expert>) -> Self {
        self.experts.insert(expert.kind(), expert);
        self
    }

    pub fn get(&self, kind: ExpertKind) -> Option<Arc<dyn Expert>> {
        self.experts.get(&kind).cloned()
    }

    pub fn contains(&self, kind: ExpertKind) -> bool {
        self.experts.contains_key(&kind)
    }

    /// Registered kinds in priority order.
    pub fn kinds(&self) -> Vec<ExpertKind> {
        ExpertKind::ALL
            .into_iter()
            .filter(|kind| self.experts.contains_key(kind))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.experts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.experts.is_empty()
    }
}

/// Drop the lowest-scoring chunks until the remainder fits the character
/// budget. When anything was retrieved at least the best chunk survives,
/// even if it alone exceeds the budget.
pub(crate) fn select_context(
    mut hits: Vec<RetrievedChunk>,
    budget: usize,
) -> Vec<RetrievedChunk> {
    let mut total: usize = hits.iter().map(|hit| hit.record.text.len()).sum();
    while hits.len() > 1 && total > budget {
        if let Some(dropped) = hits.pop() {
            total -= dropped.record.text.len();
        }
    }
    hits
}

/// Confidence for a retrieval-grounded answer: the best hit's similarity,
/// or `ungrounded` when nothing made it into context.
pub(crate) fn grounded_confidence(context: &[RetrievedChunk], ungrounded: f32) -> f32 {
    context.first().map_or(ungrounded, |best| best.score)
}

/// Frame chunks for the model prompt, one delimited excerpt per chunk.
pub(crate) fn frame_excerpts(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|chunk| {
            format!(
                "--- BEGIN EXCERPT FROM {} ({}) ---\n{}\n--- END EXCERPT ---",
                chunk.record.title, chunk.record.locator, chunk.record.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docstore::ChunkRecord;

    fn hit(id: &str, score: f32, len: usize) -> RetrievedChunk {
        RetrievedChunk {
            record: ChunkRecord {
                id: id.to_string(),
                source_id: "doc".to_string(),
                title: "Doc".to_string(),
                locator: "chunk 0".to_string(),
                index: 0,
                text: "x".repeat(len),
            },
            score,
        }
    }

    #[test]
    /// The lowest-scoring chunk goes first, even when a smaller, lower-ranked
    /// chunk would have squeezed in.
    fn test_select_context_drops_lowest_first() {
        let hits = vec![hit("a", 0.9, 60), hit("b", 0.8, 50), hit("c", 0.7, 30)];
        let kept = select_context(hits, 100);
        let ids: Vec<&str> = kept.iter().map(|h| h.record.id.as_str()).collect();
        assert_eq!(ids, vec!["a"]);
    }

    #[test]
    fn test_select_context_keeps_everything_that_fits() {
        let hits = vec![hit("a", 0.9, 40), hit("b", 0.8, 40)];
        assert_eq!(select_context(hits, 100).len(), 2);
    }

    #[test]
    /// A single oversized chunk is still kept; empty stays empty.
    fn test_select_context_edges() {
        let kept = select_context(vec![hit("a", 0.9, 500)], 100);
        assert_eq!(kept.len(), 1);
        assert!(select_context(Vec::new(), 100).is_empty());
    }

    #[test]
    fn test_grounded_confidence_tracks_best_hit() {
        let hits = vec![hit("a", 0.82, 10), hit("b", 0.4, 10)];
        assert_eq!(grounded_confidence(&hits, 0.5), 0.82);
        assert_eq!(grounded_confidence(&[], 0.5), 0.5);
    }

    #[test]
    fn test_frame_excerpts_delimits_each_chunk() {
        let chunks = vec![hit("a", 0.9, 5), hit("b", 0.8, 5)];
        let framed = frame_excerpts(&chunks);
        assert_eq!(framed.matches("--- BEGIN EXCERPT FROM").count(), 2);
        assert_eq!(framed.matches("--- END EXCERPT ---").count(), 2);
        assert!(framed.contains("Doc (chunk 0)"));
    }

    struct StubExpert(ExpertKind);

    #[async_trait]
    impl Expert for StubExpert {
        fn kind(&self) -> ExpertKind {
            self.0
        }
        fn capability(&self) -> ExpertCapability {
            ExpertCapability::ModelOnly
        }
        async fn answer(
            &self,
            _query: &str,
            _history: &[Message],
            _ctx: &ExpertContext,
        ) -> Result<AnswerResult, ExpertError> {
            Ok(AnswerResult::new("stub"))
        }
    }

    #[test]
    /// Registration order must not leak into iteration order.
    fn test_registry_kinds_follow_priority_order() {
        let registry = ExpertRegistry::new()
            .register(Arc::new(StubExpert(ExpertKind::General)))
            .register(Arc::new(StubExpert(ExpertKind::Inventory)));
        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.kinds(),
            vec![ExpertKind::Inventory, ExpertKind::General]
        );
        assert!(registry.contains(ExpertKind::General));
        assert!(!registry.contains(ExpertKind::HardwareDocs));
    }
}
