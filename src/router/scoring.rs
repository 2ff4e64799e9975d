//! Pluggable policies for turning raw trigger matches into a routing score.

/// Raw evidence for one expert on one question.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MatchSignal {
    /// Sum of the weights of every trigger that fired.
    pub weight_sum: f32,
    /// How many distinct triggers fired.
    pub hits: usize,
    /// Token count of the question, for policies that normalize by length.
    pub token_count: usize,
}

/// Turns a [`MatchSignal`] into a score in `[0.0, 1.0]`.
///
/// Policies must be deterministic: the same signal always yields the same
/// score. The router treats the policy as a black box, so swapping one in
/// changes ranking behavior without touching the lexicon.
pub trait ScoringPolicy: Send + Sync {
    fn name(&self) -> &'static str;
    fn combine(&self, signal: &MatchSignal) -> f32;
}

/// Weight mass saturating toward 1.0: `w / (w + 2)`.
///
/// A single strong trigger clears a sensible threshold; additional triggers
/// keep raising the score with diminishing returns.
#[derive(Clone, Copy, Debug, Default)]
pub struct MaxScorePolicy;

impl ScoringPolicy for MaxScorePolicy {
    fn name(&self) -> &'static str {
        "max-score"
    }

    fn combine(&self, signal: &MatchSignal) -> f32 {
        if signal.weight_sum <= 0.0 {
            return 0.0;
        }
        signal.weight_sum / (signal.weight_sum + 2.0)
    }
}

/// Like [`MaxScorePolicy`] but each distinct trigger also casts a small
/// fixed vote, so three weak matches can outrank one strong one.
#[derive(Clone, Copy, Debug, Default)]
pub struct WeightedVotePolicy;

impl ScoringPolicy for WeightedVotePolicy {
    fn name(&self) -> &'static str {
        "weighted-vote"
    }

    fn combine(&self, signal: &MatchSignal) -> f32 {
        if signal.weight_sum <= 0.0 {
            return 0.0;
        }
        let mass = signal.weight_sum + signal.hits as f32 * 0.5;
        mass / (mass + 2.0)
    }
}
