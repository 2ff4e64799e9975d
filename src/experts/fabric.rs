//! Live expert over the network fabric controller.

use std::sync::Arc;

use async_trait::async_trait;

use crate::answer::AnswerResult;
use crate::message::Message;
use crate::tools::fabric::{FabricApi, FabricQuery, answer_fabric_query};
use crate::types::{ExpertCapability, ExpertKind};

use super::{Expert, ExpertContext, ExpertError};

const STAGE: &str = "network-fabric";

/// Confidence for answers backed by live controller data.
const LIVE_CONFIDENCE: f32 = 0.9;

/// Answers fabric questions with live controller data.
///
/// Classification is total: a question that names nothing specific gets the
/// fabric overview. Controller failures surface as errors so the pipeline
/// can fall back.
pub struct FabricExpert {
    api: Arc<dyn FabricApi>,
}

impl FabricExpert {
    pub fn new(api: Arc<dyn FabricApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Expert for FabricExpert {
    fn kind(&self) -> ExpertKind {
        ExpertKind::NetworkFabric
    }

    fn capability(&self) -> ExpertCapability {
        ExpertCapability::LiveApi
    }

    async fn answer(
        &self,
        query: &str,
        _history: &[Message],
        ctx: &ExpertContext,
    ) -> Result<AnswerResult, ExpertError> {
        let kind = FabricQuery::classify(query);
        ctx.emit_stage(STAGE, format!("running {kind:?} query"));
        let body = answer_fabric_query(self.api.as_ref(), kind).await?;
        Ok(AnswerResult::new(format!(
            "Here is the current view from the fabric controller.\n\n{body}"
        ))
        .with_confidence(LIVE_CONFIDENCE))
    }
}
