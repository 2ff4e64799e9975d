//! Answer payloads produced by experts.
//!
//! Every expert, whatever its capability, resolves a query into an
//! [`AnswerResult`]: the answer text, the citations that ground it, and a
//! confidence score. Document-grounded experts cite exactly the excerpts
//! they placed in model context; live-API and model-only experts return no
//! citations.

use serde::{Deserialize, Serialize};

/// A pointer back to the source material that grounded part of an answer.
///
/// Citations are emitted only for excerpts that were actually included in
/// the model's context. Retrieved chunks dropped to fit the context budget
/// are never cited.
///
/// # Examples
///
/// ```rust
/// use switchboard::answer::Citation;
///
/// let citation = Citation::new("gb300-datasheet", "GB300 NVL72 Datasheet", "chunk 14")
///     .with_score(0.87);
/// assert_eq!(citation.source_id, "gb300-datasheet");
/// assert_eq!(citation.score, Some(0.87));
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// Identifier of the source document the excerpt came from.
    pub source_id: String,
    /// Human-readable title of the source document.
    pub title: String,
    /// Where inside the source the excerpt sits (e.g. `"chunk 14"`).
    pub locator: String,
    /// Retrieval similarity for the cited excerpt, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl Citation {
    /// Creates a citation without a retrieval score.
    #[must_use]
    pub fn new(
        source_id: impl Into<String>,
        title: impl Into<String>,
        locator: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            title: title.into(),
            locator: locator.into(),
            score: None,
        }
    }

    /// Attaches the retrieval similarity that surfaced the excerpt.
    #[must_use]
    pub fn with_score(mut self, score: f32) -> Self {
        self.score = Some(score);
        self
    }
}

/// What an expert produced for a single query.
///
/// Confidence is the expert's own estimate in `[0.0, 1.0]`; the orchestrator
/// forces it to `0.0` when an answer was produced on a fallback path after
/// the preferred expert failed.
///
/// # Examples
///
/// ```rust
/// use switchboard::answer::{AnswerResult, Citation};
///
/// let answer = AnswerResult::new("The GB300 draws up to 1.4 kW per module.")
///     .with_citations(vec![Citation::new("gb300-datasheet", "GB300 Datasheet", "chunk 3")])
///     .with_confidence(0.9);
/// assert_eq!(answer.citations.len(), 1);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AnswerResult {
    /// The answer text shown to the caller.
    pub text: String,
    /// Sources that grounded the answer, in context order.
    pub citations: Vec<Citation>,
    /// The expert's confidence in `[0.0, 1.0]`.
    pub confidence: f32,
}

impl AnswerResult {
    /// Creates an answer with no citations and zero confidence.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            citations: Vec::new(),
            confidence: 0.0,
        }
    }

    /// Attaches the citations that ground this answer.
    #[must_use]
    pub fn with_citations(mut self, citations: Vec<Citation>) -> Self {
        self.citations = citations;
        self
    }

    /// Sets the confidence estimate, clamped to `[0.0, 1.0]`.
    #[must_use]
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    /// Builder methods populate fields and leave the rest at defaults.
    fn test_answer_builder() {
        let answer = AnswerResult::new("42 servers online")
            .with_citations(vec![Citation::new("inv", "Inventory", "chunk 0")])
            .with_confidence(0.75);
        assert_eq!(answer.text, "42 servers online");
        assert_eq!(answer.citations.len(), 1);
        assert_eq!(answer.confidence, 0.75);
    }

    #[test]
    /// Confidence outside the unit interval is clamped, not rejected.
    fn test_confidence_clamped() {
        assert_eq!(AnswerResult::new("a").with_confidence(3.0).confidence, 1.0);
        assert_eq!(AnswerResult::new("b").with_confidence(-0.5).confidence, 0.0);
    }

    #[test]
    /// A scoreless citation omits the score field entirely when serialized.
    fn test_citation_serialization_omits_missing_score() {
        let citation = Citation::new("doc", "Doc", "chunk 1");
        let json = serde_json::to_string(&citation).expect("serialize");
        assert!(!json.contains("score"));

        let scored = citation.with_score(0.5);
        let json = serde_json::to_string(&scored).expect("serialize");
        assert!(json.contains("\"score\":0.5"));
    }
}
