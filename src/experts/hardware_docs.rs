//! RAG expert over the AI-hardware documentation index.
//!
//! Retrieval decides what the model is allowed to know: the answer prompt
//! carries only the selected excerpts, and the citations on the result are
//! exactly those excerpts. A question the docs do not cover comes back as an
//! honest "not covered" rather than a guess.

use std::sync::Arc;

use async_trait::async_trait;

use crate::answer::{AnswerResult, Citation};
use crate::docstore::VectorRetriever;
use crate::event_bus::ModelEvent;
use crate::message::Message;
use crate::model::{ChatModel, ChatRequest};
use crate::types::{ExpertCapability, ExpertKind};

use super::{Expert, ExpertContext, ExpertError, frame_excerpts, grounded_confidence,
    select_context};

/// Character budget for excerpts in the prompt.
pub const DEFAULT_CONTEXT_BUDGET: usize = 6_000;

/// Confidence reported when the docs had nothing relevant to ground on.
const UNGROUNDED_CONFIDENCE: f32 = 0.2;

const STAGE: &str = "hardware-docs";

const SYSTEM_PROMPT: &str = "You are a hardware documentation assistant for an AI datacenter. \
Answer using only the provided documentation excerpts and quote figures exactly as written. \
When the excerpts do not cover the question, say so plainly instead of guessing.";

pub struct HardwareDocsExpert {
    retriever: Arc<VectorRetriever>,
    model: Arc<dyn ChatModel>,
    context_budget: usize,
}

impl HardwareDocsExpert {
    pub fn new(retriever: Arc<VectorRetriever>, model: Arc<dyn ChatModel>) -> Self {
        Self {
            retriever,
            model,
            context_budget: DEFAULT_CONTEXT_BUDGET,
        }
    }

    #[must_use]
    pub fn with_context_budget(mut self, budget: usize) -> Self {
        self.context_budget = budget.max(1);
        self
    }
}

#[async_trait]
impl Expert for HardwareDocsExpert {
    fn kind(&self) -> ExpertKind {
        ExpertKind::HardwareDocs
    }

    fn capability(&self) -> ExpertCapability {
        ExpertCapability::RagBacked
    }

    async fn answer(
        &self,
        query: &str,
        history: &[Message],
        ctx: &ExpertContext,
    ) -> Result<AnswerResult, ExpertError> {
        let hits = self.retriever.retrieve(query).await?;
        let context = select_context(hits, self.context_budget);
        ctx.emit_stage(
            STAGE,
            format!("{} excerpts selected for context", context.len()),
        );

        let user = if context.is_empty() {
            format!(
                "No documentation excerpts matched this question.\n\nQuestion: {query}"
            )
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
            .with_confidence(grounded_confidence(&context, UNGROUNDED_CONFIDENCE)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docstore::{DocStoreBuilder, DocumentSource, RetrieverConfig, SharedIndex,
        SqliteVectorIndex};
    use crate::embedding::MockEmbeddingProvider;
    use crate::model::ScriptedChatModel;
    use tempfile::tempdir;

    async fn docs_retriever(
        dir: &tempfile::TempDir,
        sources: Vec<DocumentSource>,
    ) -> Arc<VectorRetriever> {
        let provider = Arc::new(MockEmbeddingProvider::new());
        let path = dir.path().join("docs.db");
        DocStoreBuilder::new(provider.clone(), &path)
            .build(sources)
            .await
            .unwrap();
        let index = SqliteVectorIndex::open(&path).await.unwrap();
        Arc::new(
            VectorRetriever::new(
                SharedIndex::new(index),
                provider,
                RetrieverConfig::default(),
            )
            .unwrap(),
        )
    }

    fn sources() -> Vec<DocumentSource> {
        vec![
            DocumentSource::new(
                "gb-power",
                "Accelerator Power Guide",
                "Each accelerator tray draws 1200 watts at full training load.",
            ),
            DocumentSource::new(
                "gb-cooling",
                "Cooling Manual",
                "Liquid cooling loops must be bled before first power-on.",
            ),
        ]
    }

    #[tokio::test]
    /// Citations are exactly the excerpts that went into the prompt.
    async fn test_answer_cites_prompt_excerpts() {
        let dir = tempdir().unwrap();
        let retriever = docs_retriever(&dir, sources()).await;
        let model = ScriptedChatModel::new().with_reply("The tray draws 1200 watts.");
        let expert = HardwareDocsExpert::new(retriever, Arc::new(model.clone()));

        let ctx = ExpertContext::detached("s1", 1);
        let answer = expert
            .answer(
                "Each accelerator tray draws 1200 watts at full training load.",
                &[],
                &ctx,
            )
            .await
            .unwrap();

        assert_eq!(answer.text, "The tray draws 1200 watts.");
        assert!(!answer.citations.is_empty());
        assert_eq!(answer.citations[0].source_id, "gb-power");
        assert!(answer.citations[0].score.unwrap() > 0.99);
        // Confidence follows the best retrieval hit.
        assert!(answer.confidence > 0.99);

        let request = &model.requests()[0];
        assert_eq!(request.system.as_deref(), Some(SYSTEM_PROMPT));
        // one framed excerpt per citation, nothing more
        assert_eq!(
            request.user.matches("--- BEGIN EXCERPT FROM").count(),
            answer.citations.len()
        );
    }

    #[tokio::test]
    /// A tight budget keeps only the top excerpt, and only it is cited.
    async fn test_budget_trims_citations() {
        let dir = tempdir().unwrap();
        let retriever = docs_retriever(&dir, sources()).await;
        let model = ScriptedChatModel::new().with_default_reply("ok");
        let expert = HardwareDocsExpert::new(retriever, Arc::new(model))
            .with_context_budget(10);

        let ctx = ExpertContext::detached("s1", 1);
        let answer = expert
            .answer("Liquid cooling loops must be bled before first power-on.", &[], &ctx)
            .await
            .unwrap();
        assert_eq!(answer.citations.len(), 1);
        assert_eq!(answer.citations[0].source_id, "gb-cooling");
    }

    #[tokio::test]
    /// An empty index answers without citations and tells the model so.
    async fn test_empty_index_yields_no_citations() {
        let dir = tempdir().unwrap();
        let retriever = docs_retriever(&dir, Vec::new()).await;
        let model = ScriptedChatModel::new().with_default_reply("The docs do not cover that.");
        let expert = HardwareDocsExpert::new(retriever, Arc::new(model.clone()));

        let ctx = ExpertContext::detached("s1", 1);
        let answer = expert.answer("anything", &[], &ctx).await.unwrap();
        assert!(answer.citations.is_empty());
        assert_eq!(answer.confidence, UNGROUNDED_CONFIDENCE);
        assert!(
            model.requests()[0]
                .user
                .starts_with("No documentation excerpts matched")
        );
    }

    #[tokio::test]
    /// Model failure surfaces as an error for the pipeline to handle.
    async fn test_model_failure_propagates() {
        let dir = tempdir().unwrap();
        let retriever = docs_retriever(&dir, sources()).await;
        let model = ScriptedChatModel::new().with_failure(400, "bad request");
        let expert = HardwareDocsExpert::new(retriever, Arc::new(model));

        let ctx = ExpertContext::detached("s1", 1);
        let err = expert.answer("power draw", &[], &ctx).await.unwrap_err();
        assert!(matches!(err, ExpertError::Model(_)));
    }
}
