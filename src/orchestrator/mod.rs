//! Turn pipeline: route a question, run the chosen expert, fall back at
//! most once if it fails, and remember the exchange.
//!
//! A turn moves through a fixed set of phases:
//!
//! ```text
//! Routing ──► Answering ──► Done
//!                │            ▲
//!                ▼            │
//!            FallingBack ─────┘
//! ```
//!
//! [`Orchestrator::handle_query`] is infallible: whatever breaks inside a
//! turn is converted into a degraded answer plus [`FaultEvent`]s on the
//! report, never an `Err`. Callers always get text they can show a user.
//!
//! # Examples
//!
//! ```no_run
//! use switchboard::event_bus::EventBus;
//! use switchboard::experts::ExpertRegistry;
//! use switchboard::orchestrator::{Orchestrator, PipelineConfig, QueryRequest};
//!
//! # async fn run(experts: ExpertRegistry) {
//! let bus = EventBus::default();
//! let orchestrator = Orchestrator::new(experts, PipelineConfig::default(), bus.get_sender());
//!
//! let report = orchestrator
//!     .handle_query(QueryRequest::new("ops-chat", "which servers need a firmware upgrade?"))
//!     .await;
//! println!("[{}] {}", report.response.expert_used, report.response.text);
//! # }
//! ```

pub mod config;
pub mod session;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::answer::{AnswerResult, Citation};
use crate::event_bus::{Event, TURN_END_SCOPE};
use crate::experts::{ExpertContext, ExpertRegistry};
use crate::faults::{ErrorLadder, FaultEvent};
use crate::message::Message;
use crate::router::{RouteDecision, RouteTarget, Router};
use crate::types::ExpertKind;

pub use config::{ConfigError, PipelineConfig, PipelineConfigBuilder};
pub use session::SessionStore;

/// Scope used for pipeline-level stage events.
const PIPELINE_STAGE: &str = "pipeline";

/// Scope used when a recorded fault is mirrored onto the event bus.
const FAULT_SCOPE: &str = "fault";

/// Shown when the primary expert and the fallback both failed.
pub const EXHAUSTED_ANSWER: &str = "I could not reach any of the data sources needed to answer that right now. Please try again in a little while.";

/// Phases a turn moves through, in order. `Idle` is the state between
/// turns; the others are emitted as stage events while a turn runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnPhase {
    Idle,
    Routing,
    Answering,
    FallingBack,
    Done,
}

impl TurnPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            TurnPhase::Idle => "idle",
            TurnPhase::Routing => "routing",
            TurnPhase::Answering => "answering",
            TurnPhase::FallingBack => "falling-back",
            TurnPhase::Done => "done",
        }
    }
}

impl fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One inbound question, tied to a conversation by `session_id`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub session_id: String,
    pub text: String,
}

impl QueryRequest {
    pub fn new(session_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            text: text.into(),
        }
    }
}

/// The user-facing slice of a finished turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub text: String,
    /// Expert that produced the final text. On fallback this is the
    /// fallback expert, not the one routing picked.
    pub expert_used: ExpertKind,
    pub citations: Vec<Citation>,
    /// Routing confidence for the expert that answered. Zero when the
    /// router punted to the generalist or a fallback produced the text.
    pub confidence: f32,
}

/// Everything the pipeline can say about one completed turn.
#[derive(Clone, Debug)]
pub struct TurnReport {
    /// Unique id for this turn, for correlating logs and fault events.
    pub turn_id: String,
    pub response: QueryResponse,
    /// The routing decision, including the full ranking.
    pub decision: RouteDecision,
    pub used_fallback: bool,
    /// Faults recorded along the way. Empty on a clean turn.
    pub faults: Vec<FaultEvent>,
}

/// Routes queries to experts and shepherds each turn to a printable
/// answer. Cheap to share behind an `Arc`; all interior state is
/// synchronized.
pub struct Orchestrator {
    router: Router,
    experts: ExpertRegistry,
    sessions: SessionStore,
    config: PipelineConfig,
    events: flume::Sender<Event>,
    turns: AtomicU64,
}

impl Orchestrator {
    /// Builds a pipeline over `experts`. The router starts with the
    /// default keyword lexicon and the threshold from `config`.
    pub fn new(experts: ExpertRegistry, config: PipelineConfig, events: flume::Sender<Event>) -> Self {
        let router = Router::new().with_threshold(config.route_threshold);
        Self {
            router,
            experts,
            sessions: SessionStore::new(),
            config,
            events,
            turns: AtomicU64::new(0),
        }
    }

    /// Replaces the router, e.g. to install a different scoring policy.
    #[must_use]
    pub fn with_router(mut self, router: Router) -> Self {
        self.router = router;
        self
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Forgets a conversation. Returns `false` if it was never started.
    pub fn end_session(&self, session_id: &str) -> bool {
        self.sessions.end(session_id)
    }

    /// Runs one full turn. Never fails: broken experts, timeouts, and
    /// unroutable questions all degrade into an answer plus faults.
    #[instrument(skip(self, request), fields(session = %request.session_id))]
    pub async fn handle_query(&self, request: QueryRequest) -> TurnReport {
        let turn = self.turns.fetch_add(1, Ordering::Relaxed) + 1;
        let turn_id = Uuid::new_v4().to_string();
        let ctx = ExpertContext::new(&request.session_id, turn, self.events.clone());

        self.emit_phase(&ctx, TurnPhase::Routing, format!("turn {turn} started"));
        let decision = self.router.route(&request.text);

        // An unroutable question still gets answered: hand it to the
        // generalist with zero confidence.
        let (primary, route_confidence) = match decision.target {
            RouteTarget::Expert(kind) => (kind, decision.confidence),
            RouteTarget::Unknown => (ExpertKind::General, 0.0),
        };

        let history = self
            .sessions
            .recent_history(&request.session_id, self.config.max_history_turns);
        let mut faults = Vec::new();
        let mut used_fallback = false;
        let mut expert_used = primary;
        let mut confidence = route_confidence;

        self.emit_phase(&ctx, TurnPhase::Answering, format!("asking the {primary} expert"));
        let mut answer = self
            .run_expert(primary, &request.text, &history, &ctx, turn, &mut faults)
            .await;

        if answer.is_none() {
            if let Some(fallback) = self.fallback_target(&decision, primary) {
                self.emit_phase(
                    &ctx,
                    TurnPhase::FallingBack,
                    format!("{primary} failed, trying {fallback}"),
                );
                used_fallback = true;
                expert_used = fallback;
                confidence = 0.0;
                answer = self
                    .run_expert(fallback, &request.text, &history, &ctx, turn, &mut faults)
                    .await
                    .map(|fallback_answer| {
                        let text =
                            format!("{}\n\n{}", fallback_note(primary, fallback), fallback_answer.text);
                        AnswerResult::new(text).with_citations(fallback_answer.citations)
                    });
            }
        }

        let answer = answer.unwrap_or_else(|| {
            warn!(turn, expert = %expert_used, "no expert could answer, returning degraded text");
            record_fault(
                &ctx,
                &mut faults,
                FaultEvent::pipeline(ErrorLadder::msg("every answer path failed on this turn"))
                    .with_tag("exhausted"),
            );
            confidence = 0.0;
            AnswerResult::new(EXHAUSTED_ANSWER)
        });

        self.sessions
            .record_exchange(&request.session_id, &request.text, &answer.text);
        self.emit_phase(&ctx, TurnPhase::Done, format!("answered by {expert_used}"));
        ctx.emit(Event::diagnostic(
            TURN_END_SCOPE,
            format!("turn {turn} complete"),
        ));
        info!(
            turn,
            expert = %expert_used,
            used_fallback,
            confidence,
            answer_confidence = answer.confidence,
            "turn complete"
        );

        TurnReport {
            turn_id,
            response: QueryResponse {
                text: answer.text,
                expert_used,
                citations: answer.citations,
                confidence,
            },
            decision,
            used_fallback,
            faults,
        }
    }

    /// Runs one expert under the configured timeout. A timeout counts
    /// as a failure like any other; the fault is tagged `timeout`.
    async fn run_expert(
        &self,
        kind: ExpertKind,
        query: &str,
        history: &[Message],
        ctx: &ExpertContext,
        turn: u64,
        faults: &mut Vec<FaultEvent>,
    ) -> Option<AnswerResult> {
        let Some(expert) = self.experts.get(kind) else {
            warn!(expert = %kind, "expert not registered");
            record_fault(
                ctx,
                faults,
                FaultEvent::expert(kind, turn, ErrorLadder::msg("expert not registered"))
                    .with_tag("unregistered"),
            );
            return None;
        };
        debug!(expert = %kind, capability = %expert.capability(), "dispatching");

        match tokio::time::timeout(self.config.expert_timeout, expert.answer(query, history, ctx))
            .await
        {
            Ok(Ok(answer)) => Some(answer),
            Ok(Err(err)) => {
                warn!(expert = %kind, error = %err, "expert failed");
                record_fault(
                    ctx,
                    faults,
                    FaultEvent::expert(
                        kind,
                        turn,
                        ErrorLadder::msg("expert failed to answer")
                            .with_cause(ErrorLadder::msg(err.to_string())),
                    ),
                );
                None
            }
            Err(_) => {
                let timeout_secs = self.config.expert_timeout.as_secs();
                warn!(expert = %kind, timeout_secs, "expert timed out");
                record_fault(
                    ctx,
                    faults,
                    FaultEvent::expert(
                        kind,
                        turn,
                        ErrorLadder::msg(format!("no answer within {timeout_secs}s")),
                    )
                    .with_tag("timeout"),
                );
                None
            }
        }
    }

    /// Picks the single fallback candidate: the best-ranked registered
    /// runner-up from the routing decision, else the generalist.
    fn fallback_target(&self, decision: &RouteDecision, failed: ExpertKind) -> Option<ExpertKind> {
        decision
            .runner_ups()
            .find(|kind| *kind != failed && self.experts.contains(*kind))
            .or_else(|| {
                (failed != ExpertKind::General && self.experts.contains(ExpertKind::General))
                    .then_some(ExpertKind::General)
            })
    }

    fn emit_phase(&self, ctx: &ExpertContext, phase: TurnPhase, detail: impl Into<String>) {
        ctx.emit_stage(PIPELINE_STAGE, format!("{phase}: {}", detail.into()));
    }
}

/// Keeps the fault on the turn report and mirrors it onto the event bus so
/// streaming consumers see failures as they happen.
fn record_fault(ctx: &ExpertContext, faults: &mut Vec<FaultEvent>, fault: FaultEvent) {
    ctx.emit(Event::diagnostic(FAULT_SCOPE, fault.error.message.clone()));
    faults.push(fault);
}

/// Prefix explaining to the user why a different expert is answering.
fn fallback_note(failed: ExpertKind, target: ExpertKind) -> String {
    if target.is_general() {
        format!("Note: Could not connect to the {failed} service. Using general knowledge instead.")
    } else {
        format!("Note: Could not connect to the {failed} service. Answering from the {target} expert instead.")
    }
}
