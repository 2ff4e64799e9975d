use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::telemetry::{FormatterMode, PlainFormatter, TelemetryFormatter};
use crate::types::ExpertKind;

/// Represents a recoverable fault with scope, error details, tags, and context.
///
/// Faults are the pipeline's record of things that went wrong without ending
/// the turn: a tool that timed out before fallback kicked in, a retrieval
/// that came back empty, a model call that needed a retry. Fatal errors
/// travel as `Err` values instead; faults ride along in the turn report.
///
/// # JSON Serialization Format
///
/// `FaultEvent` serializes to JSON with the following structure:
///
/// ```json
/// {
///   "when": "2026-08-24T10:30:00Z",
///   "scope": {
///     "scope": "expert",
///     "kind": "inventory",
///     "turn": 3
///   },
///   "error": {
///     "message": "tool call failed",
///     "cause": {
///       "message": "connect timeout after 10s",
///       "cause": null,
///       "details": null
///     },
///     "details": {"endpoint": "/api/v1/compute/PhysicalSummaries"}
///   },
///   "tags": ["tool", "fallback"],
///   "context": {
///     "query": "list powered-off servers"
///   }
/// }
/// ```
///
/// The `scope` field uses a tagged union format with a discriminator field
/// named `"scope"`. Supported scope variants are:
/// - `"router"`: Requires `turn` (u64)
/// - `"expert"`: Requires `kind` (expert name) and `turn` (u64)
/// - `"tool"`: Requires `name` (string) and `turn` (u64)
/// - `"session"`: Requires `session` (string) and `turn` (u64)
/// - `"pipeline"`: No additional fields
///
/// # Examples
///
/// Using constructors and builders:
///
/// ```
/// use switchboard::faults::{FaultEvent, ErrorLadder};
/// use switchboard::types::ExpertKind;
/// use serde_json::json;
///
/// let fault = FaultEvent::expert(ExpertKind::Inventory, 3, ErrorLadder::msg("tool call failed"))
///     .with_tag("fallback")
///     .with_context(json!({"query": "list powered-off servers"}));
///
/// let json_str = serde_json::to_string(&fault).unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct FaultEvent {
    #[serde(default = "chrono::Utc::now")]
    pub when: DateTime<Utc>,
    #[serde(default)]
    pub scope: FaultScope,
    #[serde(default)]
    pub error: ErrorLadder,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub context: serde_json::Value,
}

impl FaultEvent {
    /// Create a router-scoped fault.
    ///
    /// # Example
    /// ```
    /// use switchboard::faults::{FaultEvent, ErrorLadder};
    ///
    /// let fault = FaultEvent::router(1, ErrorLadder::msg("no expert above threshold"));
    /// ```
    pub fn router(turn: u64, error: ErrorLadder) -> Self {
        Self {
            when: Utc::now(),
            scope: FaultScope::Router { turn },
            error,
            tags: Vec::new(),
            context: serde_json::Value::Null,
        }
    }

    /// Create an expert-scoped fault.
    ///
    /// # Example
    /// ```
    /// use switchboard::faults::{FaultEvent, ErrorLadder};
    /// use switchboard::types::ExpertKind;
    ///
    /// let fault = FaultEvent::expert(ExpertKind::NetworkFabric, 2, ErrorLadder::msg("timed out"));
    /// ```
    pub fn expert(kind: ExpertKind, turn: u64, error: ErrorLadder) -> Self {
        Self {
            when: Utc::now(),
            scope: FaultScope::Expert { kind, turn },
            error,
            tags: Vec::new(),
            context: serde_json::Value::Null,
        }
    }

    /// Create a tool-scoped fault.
    ///
    /// # Example
    /// ```
    /// use switchboard::faults::{FaultEvent, ErrorLadder};
    ///
    /// let fault = FaultEvent::tool("fabric-controller", 2, ErrorLadder::msg("401 unauthorized"));
    /// ```
    pub fn tool<S: Into<String>>(name: S, turn: u64, error: ErrorLadder) -> Self {
        Self {
            when: Utc::now(),
            scope: FaultScope::Tool {
                name: name.into(),
                turn,
            },
            error,
            tags: Vec::new(),
            context: serde_json::Value::Null,
        }
    }

    /// Create a session-scoped fault.
    ///
    /// # Example
    /// ```
    /// use switchboard::faults::{FaultEvent, ErrorLadder};
    ///
    /// let fault = FaultEvent::session("session_123", 7, ErrorLadder::msg("all experts exhausted"));
    /// ```
    pub fn session<S: Into<String>>(session: S, turn: u64, error: ErrorLadder) -> Self {
        Self {
            when: Utc::now(),
            scope: FaultScope::Session {
                session: session.into(),
                turn,
            },
            error,
            tags: Vec::new(),
            context: serde_json::Value::Null,
        }
    }

    /// Create a pipeline-scoped fault.
    ///
    /// # Example
    /// ```
    /// use switchboard::faults::{FaultEvent, ErrorLadder};
    ///
    /// let fault = FaultEvent::pipeline(ErrorLadder::msg("index unavailable at startup"));
    /// ```
    pub fn pipeline(error: ErrorLadder) -> Self {
        Self {
            when: Utc::now(),
            scope: FaultScope::Pipeline,
            error,
            tags: Vec::new(),
            context: serde_json::Value::Null,
        }
    }

    /// Add multiple tags to this fault.
    ///
    /// # Example
    /// ```
    /// use switchboard::faults::{FaultEvent, ErrorLadder};
    ///
    /// let fault = FaultEvent::pipeline(ErrorLadder::msg("ingest skipped 2 sources"))
    ///     .with_tags(vec!["ingest".to_string(), "partial".to_string()]);
    /// ```
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Add a single tag to this fault.
    ///
    /// # Example
    /// ```
    /// use switchboard::faults::{FaultEvent, ErrorLadder};
    ///
    /// let fault = FaultEvent::router(1, ErrorLadder::msg("scores tied"))
    ///     .with_tag("tie-break");
    /// ```
    pub fn with_tag<S: Into<String>>(mut self, tag: S) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Add context metadata to this fault.
    ///
    /// # Example
    /// ```
    /// use switchboard::faults::{FaultEvent, ErrorLadder};
    /// use serde_json::json;
    ///
    /// let fault = FaultEvent::tool("management-api", 1, ErrorLadder::msg("unreachable"))
    ///     .with_context(json!({"base_url": "https://intersight.local"}));
    /// ```
    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }
}

/// Where in the pipeline a fault originated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum FaultScope {
    Router {
        turn: u64,
    },
    Expert {
        kind: ExpertKind,
        turn: u64,
    },
    Tool {
        name: String,
        turn: u64,
    },
    Session {
        session: String,
        turn: u64,
    },
    #[default]
    Pipeline,
}

/// A message with an optional chain of causes, each carrying free-form details.
///
/// The ladder preserves causal depth across serialization, so a tool failure
/// that surfaced through an expert keeps both layers visible in the report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorLadder {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<ErrorLadder>>,
    #[serde(default)]
    pub details: serde_json::Value,
}

impl Default for ErrorLadder {
    fn default() -> Self {
        ErrorLadder {
            message: String::new(),
            cause: None,
            details: serde_json::Value::Null,
        }
    }
}

impl std::fmt::Display for ErrorLadder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ErrorLadder {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause.as_ref().map(|c| c as &dyn std::error::Error)
    }
}

impl ErrorLadder {
    pub fn msg<M: Into<String>>(m: M) -> Self {
        ErrorLadder {
            message: m.into(),
            cause: None,
            details: serde_json::Value::Null,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    pub fn with_cause(mut self, cause: ErrorLadder) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }
}

/// Format faults with explicit color mode control.
///
/// This function allows you to control whether ANSI color codes are included
/// in the output:
/// - [`FormatterMode::Auto`]: Auto-detects TTY capability (checks stderr)
/// - [`FormatterMode::Colored`]: Always includes color codes
/// - [`FormatterMode::Plain`]: Never includes color codes
///
/// # Examples
///
/// ```
/// use switchboard::faults::{FaultEvent, ErrorLadder, pretty_print_with_mode};
/// use switchboard::telemetry::FormatterMode;
///
/// let faults = vec![
///     FaultEvent::tool("fabric-controller", 1, ErrorLadder::msg("connect timeout"))
/// ];
///
/// // Force plain output (no colors) for log files
/// let plain = pretty_print_with_mode(&faults, FormatterMode::Plain);
/// assert!(!plain.contains("\x1b[")); // No ANSI codes
///
/// // Force colored output
/// let colored = pretty_print_with_mode(&faults, FormatterMode::Colored);
/// ```
pub fn pretty_print_with_mode(faults: &[FaultEvent], mode: FormatterMode) -> String {
    let formatter = PlainFormatter::with_mode(mode);
    let renders = formatter.render_faults(faults);
    let mut out = String::new();
    for (idx, render) in renders.into_iter().enumerate() {
        if idx > 0 {
            out.push('\n');
        }
        for line in render.lines {
            out.push_str(&line);
        }
    }
    out
}

/// Format faults as human-readable text with auto-detected color support.
///
/// Colors are automatically enabled when stderr is a TTY and disabled
/// otherwise. For explicit control over color output, use
/// [`pretty_print_with_mode`].
///
/// # Examples
///
/// ```
/// use switchboard::faults::{FaultEvent, ErrorLadder, pretty_print};
///
/// let faults = vec![
///     FaultEvent::router(1, ErrorLadder::msg("no expert above threshold"))
/// ];
///
/// let output = pretty_print(&faults);
/// ```
pub fn pretty_print(faults: &[FaultEvent]) -> String {
    pretty_print_with_mode(faults, FormatterMode::Auto)
}
