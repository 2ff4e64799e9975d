//! Live expert over the datacenter inventory service.

use std::sync::Arc;

use async_trait::async_trait;

use crate::answer::AnswerResult;
use crate::message::Message;
use crate::tools::inventory::{InventoryApi, InventoryQuery, answer_inventory_query};
use crate::types::{ExpertCapability, ExpertKind};

use super::{Expert, ExpertContext, ExpertError};

const STAGE: &str = "inventory";

/// Confidence for answers backed by live service data.
const LIVE_CONFIDENCE: f32 = 0.9;

/// Confidence for the capability description, which answers about the
/// expert rather than the question.
const DEFLECTED_CONFIDENCE: f32 = 0.2;

const CAPABILITIES: &str = "I can report live inventory data: physical servers, virtual \
machines, device connectors, network elements, health alerts, firmware versions, firmware \
upgrade recommendations, and server profiles. Ask about one of those and I will pull the \
current numbers.";

/// Answers inventory questions with live data, formatted as markdown tables.
///
/// No model call is involved: the service's structured answer is the answer.
/// Any backend failure surfaces as an error so the pipeline can fall back.
pub struct InventoryExpert {
    api: Arc<dyn InventoryApi>,
}

impl InventoryExpert {
    pub fn new(api: Arc<dyn InventoryApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Expert for InventoryExpert {
    fn kind(&self) -> ExpertKind {
        ExpertKind::Inventory
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
        let Some(kind) = InventoryQuery::classify(query) else {
            ctx.emit_stage(STAGE, "no inventory query matched, describing capabilities");
            return Ok(AnswerResult::new(CAPABILITIES).with_confidence(DEFLECTED_CONFIDENCE));
        };

        ctx.emit_stage(STAGE, format!("running {kind} query"));
        let body = answer_inventory_query(self.api.as_ref(), kind).await?;
        Ok(AnswerResult::new(format!(
            "Here is the current view from the inventory service.\n\n{body}"
        ))
        .with_confidence(LIVE_CONFIDENCE))
    }
}
