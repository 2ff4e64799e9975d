//! The generalist, and the pipeline's safety net.
//!
//! With a retriever attached it behaves like the docs expert, but it keeps
//! answering when retrieval is unavailable: a failed lookup downgrades the
//! turn to model-only instead of failing it. Only a model failure makes this
//! expert error out.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::answer::{AnswerResult, Citation};
use crate::docstore::VectorRetriever;
use crate::event_bus::{Event, ModelEvent};
use crate::message::Message;
use crate::model::{ChatModel, ChatRequest};
use crate::types::{ExpertCapability, ExpertKind};

use super::{DEFAULT_CONTEXT_BUDGET, Expert, ExpertContext, ExpertError, frame_excerpts,
    grounded_confidence, select_context};

const STAGE: &str = "general";

/// Confidence reported for model-only answers with no grounding.
const MODEL_ONLY_CONFIDENCE: f32 = 0.5;

const SYSTEM_PROMPT: &str = "You are a helpful assistant for an infrastructure operations \
team. Use any provided excerpts when they are relevant; otherwise answer from general \
knowledge, briefly and accurately.";

pub struct GeneralExpert {
    model: Arc<dyn ChatModel>,
    retriever: Option<Arc<VectorRetriever>>,
    context_budget: usize,
}

impl GeneralExpert {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            model,
            retriever: None,
            context_budget: DEFAULT_CONTEXT_BUDGET,
        }
    }

    /// Attach a document retriever for grounded answers.
    #[must_use]
    pub fn with_retriever(mut self, retriever: Arc<VectorRetriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    #[must_use]
    pub fn with_context_budget(mut self, budget: usize) -> Self {
        self.context_budget = budget.max(1);
        self
    }
}

#[async_trait]
impl Expert for GeneralExpert {
    fn kind(&self) -> ExpertKind {
        ExpertKind::General
    }

    fn capability(&self) -> ExpertCapability {
        if self.retriever.is_some() {
            ExpertCapability::RagBacked
        } else {
            ExpertCapability::ModelOnly
        }
    }

    async fn answer(
        &self,
        query: &str,
        history: &[Message],
        ctx: &ExpertContext,
    ) -> Result<AnswerResult, ExpertError> {
        let mut context = Vec::new();
        if let Some(retriever) = &self.retriever {
            match retriever.retrieve(query).await {
                Ok(hits) => context = select_context(hits, self.context_budget),
                Err(err) => {
                    // Retrieval trouble must not take the safety net down.
                    warn!(error = %err, "continuing without retrieval context");
                    ctx.emit(Event::diagnostic(
                        STAGE,
                        format!("retrieval unavailable, answering model-only: {err}"),
                    ));
                }
            }
        }
        ctx.emit_stage(
            STAGE,
            if context.is_empty() {
                "answering model-only".to_string()
            } else {
                format!("answering with {} excerpts", context.len())
            },
        );

        let user = if context.is_empty() {
            query.to_string()
        } else {
            format!("{}\n\nQuestion: {query}", frame_excerpts(&context))
        };
        let request = ChatRequest::new(user)
            .with_system(SYSTEM_PROMPT)
            .with_history(history.to_vec());

        ctx.emit_model(ModelEvent::request(
            self.model.provider_id(),
            Some(STAGE.to_string()),
        ));
        let text = match self.model.complete_with_retry(&request).await {
            Ok(text) => text,
            Err(err) => {
                ctx.emit_model(ModelEvent::error(
                    self.model.provider_id(),
                    Some(STAGE.to_string()),
                    err.to_string(),
                ));
                return Err(err.into());
            }
        };
        ctx.emit_model(ModelEvent::completion(
            self.model.provider_id(),
            Some(STAGE.to_string()),
            "completion received",
        ));

        let citations = context
            .iter()
            .map(|chunk| {
                Citation::new(
                    chunk.record.source_id.clone(),
                    chunk.record.title.clone(),
                    chunk.record.locator.clone(),
                )
                .with_score(chunk.score)
            })
            .collect();
        Ok(AnswerResult::new(text)
            .with_citations(citations)
            .with_confidence(grounded_confidence(&context, MODEL_ONLY_CONFIDENCE)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docstore::{DocStoreBuilder, DocumentSource, RetrieverConfig, SharedIndex,
        SqliteVectorIndex};
    use crate::embedding::MockEmbeddingProvider;
    use crate::message::Message;
    use crate::model::ScriptedChatModel;
    use tempfile::tempdir;

    #[tokio::test]
    /// Without a retriever the expert is model-only and cites nothing.
    async fn test_model_only_answer() {
        let model = ScriptedChatModel::new().with_reply("Paris.");
        let expert = GeneralExpert::new(Arc::new(model.clone()));
        assert_eq!(expert.capability(), ExpertCapability::ModelOnly);

        let ctx = ExpertContext::detached("s1", 1);
        let history = vec![Message::user("hi"), Message::assistant("hello")];
        let answer = expert
            .answer("what is the capital of France?", &history, &ctx)
            .await
            .unwrap();

        assert_eq!(answer.text, "Paris.");
        assert!(answer.citations.is_empty());
        assert_eq!(answer.confidence, MODEL_ONLY_CONFIDENCE);
        let request = &model.requests()[0];
        assert_eq!(request.history, history);
        assert_eq!(request.user, "what is the capital of France?");
    }

    #[tokio::test]
    /// With a retriever attached, matching excerpts get cited.
    async fn test_grounded_answer_carries_citations() {
        let dir = tempdir().unwrap();
        let provider = Arc::new(MockEmbeddingProvider::new());
        let path = dir.path().join("docs.db");
        DocStoreBuilder::new(provider.clone(), &path)
            .build(vec![DocumentSource::new(
                "runbook",
                "Ops Runbook",
                "Escalate pager alerts to the on-call lead after two pages.",
            )])
            .await
            .unwrap();
        let index = SqliteVectorIndex::open(&path).await.unwrap();
        let retriever = Arc::new(
            VectorRetriever::new(
                SharedIndex::new(index),
                provider,
                RetrieverConfig::default(),
            )
            .unwrap(),
        );

        let model = ScriptedChatModel::new().with_default_reply("Escalate after two pages.");
        let expert = GeneralExpert::new(Arc::new(model)).with_retriever(retriever);
        assert_eq!(expert.capability(), ExpertCapability::RagBacked);

        let ctx = ExpertContext::detached("s1", 1);
        let answer = expert
            .answer(
                "Escalate pager alerts to the on-call lead after two pages.",
                &[],
                &ctx,
            )
            .await
            .unwrap();
        assert_eq!(answer.citations.len(), 1);
        assert_eq!(answer.citations[0].source_id, "runbook");
        assert!(answer.confidence > MODEL_ONLY_CONFIDENCE);
    }

    #[tokio::test]
    /// A broken retrieval path degrades to model-only instead of failing.
    async fn test_degrades_when_retrieval_fails() {
        let dir = tempdir().unwrap();
        let provider = Arc::new(MockEmbeddingProvider::new());
        let path = dir.path().join("docs.db");
        DocStoreBuilder::new(provider.clone(), &path)
            .build(vec![DocumentSource::new("a", "A", "some text")])
            .await
            .unwrap();
        let index = SqliteVectorIndex::open(&path).await.unwrap();
        let shared = SharedIndex::new(index);
        let retriever = Arc::new(
            VectorRetriever::new(shared.clone(), provider, RetrieverConfig::default()).unwrap(),
        );

        // A rebuild with a different embedding dimension lands while this
        // retriever is alive; its searches now fail at query time.
        let narrow = Arc::new(MockEmbeddingProvider::new().with_dimension(32));
        let other_path = dir.path().join("docs-narrow.db");
        DocStoreBuilder::new(narrow, &other_path)
            .build(vec![DocumentSource::new("b", "B", "other text")])
            .await
            .unwrap();
        shared.replace(SqliteVectorIndex::open(&other_path).await.unwrap());

        let model = ScriptedChatModel::new().with_reply("Answering from memory.");
        let expert = GeneralExpert::new(Arc::new(model)).with_retriever(retriever);

        let ctx = ExpertContext::detached("s1", 1);
        let answer = expert.answer("some text", &[], &ctx).await.unwrap();
        assert_eq!(answer.text, "Answering from memory.");
        assert!(answer.citations.is_empty());
        assert_eq!(answer.confidence, MODEL_ONLY_CONFIDENCE);
    }

    #[tokio::test]
    async fn test_model_failure_is_an_error() {
        let model = ScriptedChatModel::new().with_failure(400, "nope");
        let expert = GeneralExpert::new(Arc::new(model));
        let ctx = ExpertContext::detached("s1", 1);
        let err = expert.answer("hello", &[], &ctx).await.unwrap_err();
        assert!(matches!(err, ExpertError::Model(_)));
    }
}
