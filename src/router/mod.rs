//! Keyword router: decides which expert answers a question.
//!
//! Routing is pure and deterministic. The question is lowercased and
//! tokenized once, every expert's triggers are scored, a [`ScoringPolicy`]
//! folds each expert's matches into a score in `[0.0, 1.0]`, and the experts
//! are ranked. Ties break toward the earlier expert in [`LEXICON`], which
//! lists them in priority order: inventory, network fabric, hardware docs,
//! general.
//!
//! When even the best score sits below the threshold the router answers
//! [`RouteTarget::Unknown`] rather than guessing; the pipeline then falls
//! back to the general expert with zero confidence.

pub mod lexicon;
pub mod scoring;

use tracing::debug;

use crate::types::ExpertKind;

pub use lexicon::{ExpertLexicon, LEXICON, Trigger};
pub use scoring::{MatchSignal, MaxScorePolicy, ScoringPolicy, WeightedVotePolicy};

/// Best score below this routes to [`RouteTarget::Unknown`].
pub const DEFAULT_ROUTE_THRESHOLD: f32 = 0.25;

/// Where the router decided to send a question.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteTarget {
    Expert(ExpertKind),
    /// Nothing scored above the threshold.
    Unknown,
}

/// A routing decision with the full ranking behind it.
#[derive(Clone, Debug, PartialEq)]
pub struct RouteDecision {
    pub target: RouteTarget,
    /// How far above the threshold the winner landed, scaled to `[0.0, 1.0]`.
    /// Zero for [`RouteTarget::Unknown`].
    pub confidence: f32,
    /// Every expert with its combined score, best first. Ties keep priority
    /// order.
    pub ranked: Vec<(ExpertKind, f32)>,
    /// Name of the scoring policy that produced the ranking.
    pub policy: &'static str,
}

impl RouteDecision {
    /// Experts that also matched, in rank order, for fallback hops.
    pub fn runner_ups(&self) -> impl Iterator<Item = ExpertKind> + '_ {
        self.ranked
            .iter()
            .skip(1)
            .filter(|(_, score)| *score > 0.0)
            .map(|(expert, _)| *expert)
    }
}

/// The routing engine. Cheap to construct, safe to share.
pub struct Router {
    policy: Box<dyn ScoringPolicy>,
    threshold: f32,
}

impl Router {
    pub fn new() -> Self {
        Self {
            policy: Box::new(MaxScorePolicy),
            threshold: DEFAULT_ROUTE_THRESHOLD,
        }
    }

    /// Swap the scoring policy.
    #[must_use]
    pub fn with_policy(mut self, policy: impl ScoringPolicy + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    /// Adjust the routing threshold, clamped to `[0.0, 1.0]`.
    #[must_use]
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Score every expert against the question and pick a target.
    pub fn route(&self, text: &str) -> RouteDecision {
        let text_lc = text.to_lowercase();
        let tokens = lexicon::tokenize(&text_lc);

        let mut ranked: Vec<(ExpertKind, f32)> = LEXICON
            .iter()
            .map(|entry| {
                let (weight_sum, hits) =
                    lexicon::score_matches(&text_lc, &tokens, entry.triggers);
                let signal = MatchSignal {
                    weight_sum,
                    hits,
                    token_count: tokens.len(),
                };
                (entry.expert, self.policy.combine(&signal).clamp(0.0, 1.0))
            })
            .collect();

        // Stable sort keeps lexicon order on equal scores, which is exactly
        // the priority tie-break.
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let policy = self.policy.name();
        let top = ranked.first().copied();
        let decision = match top {
            Some((expert, score)) if score >= self.threshold => {
                let confidence = ((score - self.threshold)
                    / (1.0 - self.threshold + f32::EPSILON))
                    .min(1.0);
                RouteDecision {
                    target: RouteTarget::Expert(expert),
                    confidence,
                    ranked,
                    policy,
                }
            }
            _ => RouteDecision {
                target: RouteTarget::Unknown,
                confidence: 0.0,
                ranked,
                policy,
            },
        };

        debug!(
            target = ?decision.target,
            confidence = decision.confidence,
            policy,
            "routed question"
        );
        decision
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}
