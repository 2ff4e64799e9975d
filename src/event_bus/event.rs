use std::fmt;

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const TURN_END_SCOPE: &str = "__switchboard_turn_end__";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Event {
    Stage(StageEvent),
    Diagnostic(DiagnosticEvent),
    Model(ModelEvent),
}

impl Event {
    pub fn stage_message(scope: impl Into<String>, message: impl Into<String>) -> Self {
        Event::Stage(StageEvent::new(None, None, scope.into(), message.into()))
    }

    pub fn stage_message_with_meta(
        stage_id: impl Into<String>,
        turn: u64,
        scope: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Event::Stage(StageEvent::new(
            Some(stage_id.into()),
            Some(turn),
            scope.into(),
            message.into(),
        ))
    }

    pub fn diagnostic(scope: impl Into<String>, message: impl Into<String>) -> Self {
        Event::Diagnostic(DiagnosticEvent {
            scope: scope.into(),
            message: message.into(),
        })
    }

    pub fn scope_label(&self) -> Option<&str> {
        match self {
            Event::Stage(stage) => Some(stage.scope()),
            Event::Diagnostic(diag) => Some(diag.scope()),
            Event::Model(model) => Some(model.scope().as_ref()),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Event::Stage(stage) => stage.message(),
            Event::Diagnostic(diag) => diag.message(),
            Event::Model(model) => model.message(),
        }
    }

    /// Convert event to structured JSON value with normalized schema.
    ///
    /// Returns a JSON object with the following structure:
    /// ```json
    /// {
    ///   "type": "stage" | "diagnostic" | "model",
    ///   "scope": "scope_label",
    ///   "message": "event_message",
    ///   "timestamp": "2026-08-24T12:34:56.789Z",
    ///   "metadata": { /* variant-specific fields */ }
    /// }
    /// ```
    ///
    /// # Example
    ///
    /// ```
    /// use switchboard::event_bus::Event;
    ///
    /// let event = Event::stage_message_with_meta("expert:inventory", 5, "answering", "querying tool");
    /// let json = event.to_json_value();
    ///
    /// assert_eq!(json["type"], "stage");
    /// assert_eq!(json["scope"], "answering");
    /// assert_eq!(json["message"], "querying tool");
    /// assert_eq!(json["metadata"]["stage_id"], "expert:inventory");
    /// assert_eq!(json["metadata"]["turn"], 5);
    /// ```
    pub fn to_json_value(&self) -> serde_json::Value {
        use serde_json::json;

        let (event_type, metadata) = match self {
            Event::Stage(stage) => {
                let mut meta = serde_json::Map::new();
                if let Some(stage_id) = stage.stage_id() {
                    meta.insert("stage_id".to_string(), json!(stage_id));
                }
                if let Some(turn) = stage.turn() {
                    meta.insert("turn".to_string(), json!(turn));
                }
                ("stage", Value::Object(meta))
            }
            Event::Diagnostic(_) => {
                let meta = serde_json::Map::new();
                ("diagnostic", Value::Object(meta))
            }
            Event::Model(model) => {
                let mut meta = serde_json::Map::new();
                meta.insert("provider".to_string(), json!(model.provider()));
                if let Some(stage_id) = model.stage_id() {
                    meta.insert("stage_id".to_string(), json!(stage_id));
                }
                for (key, value) in model.metadata() {
                    meta.insert(key.clone(), value.clone());
                }
                ("model", Value::Object(meta))
            }
        };

        let timestamp = match self {
            Event::Model(model) => model.timestamp(),
            _ => Utc::now(),
        };

        json!({
            "type": event_type,
            "scope": self.scope_label(),
            "message": self.message(),
            "timestamp": timestamp.to_rfc3339(),
            "metadata": metadata,
        })
    }

    /// Convert event to compact JSON string representation.
    ///
    /// # Example
    ///
    /// ```
    /// use switchboard::event_bus::Event;
    ///
    /// let event = Event::diagnostic("session", "created");
    /// let json_str = event.to_json_string().unwrap();
    /// assert!(json_str.contains("\"type\":\"diagnostic\""));
    /// ```
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_json_value())
    }

    /// Convert event to pretty-printed JSON string with indentation.
    ///
    /// Useful for debugging and log files where human readability is important.
    ///
    /// # Example
    ///
    /// ```
    /// use switchboard::event_bus::Event;
    ///
    /// let event = Event::stage_message("routing", "scores computed");
    /// let json_str = event.to_json_pretty().unwrap();
    /// assert!(json_str.contains("  \"type\": \"stage\""));
    /// ```
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.to_json_value())
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Stage(stage) => match (stage.stage_id(), stage.turn()) {
                (Some(id), Some(turn)) => write!(f, "[{id}@{turn}] {}", stage.message()),
                (Some(id), None) => write!(f, "[{id}] {}", stage.message()),
                (None, Some(turn)) => write!(f, "[turn {turn}] {}", stage.message()),
                (None, None) => write!(f, "{}", stage.message()),
            },
            Event::Diagnostic(diag) => write!(f, "{}", diag.message()),
            Event::Model(model) => {
                if let Some(stage_id) = model.stage_id() {
                    write!(f, "[model {stage_id}] {}", model.message())
                } else {
                    write!(f, "[model {}] {}", model.provider(), model.message())
                }
            }
        }
    }
}

/// Event emitted by a pipeline stage: the router, an expert, or a tool call.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageEvent {
    stage_id: Option<String>,
    turn: Option<u64>,
    scope: String,
    message: String,
}

impl StageEvent {
    pub fn new(stage_id: Option<String>, turn: Option<u64>, scope: String, message: String) -> Self {
        Self {
            stage_id,
            turn,
            scope,
            message,
        }
    }

    pub fn stage_id(&self) -> Option<&str> {
        self.stage_id.as_deref()
    }

    pub fn turn(&self) -> Option<u64> {
        self.turn
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiagnosticEvent {
    scope: String,
    message: String,
}

impl DiagnosticEvent {
    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ModelEventScope {
    Request,
    Completion,
    Retry,
    Error,
}

impl AsRef<str> for ModelEventScope {
    fn as_ref(&self) -> &str {
        match self {
            ModelEventScope::Request => "request",
            ModelEventScope::Completion => "completion",
            ModelEventScope::Retry => "retry",
            ModelEventScope::Error => "error",
        }
    }
}

/// Lifecycle event for a chat-model call made on behalf of an expert.
///
/// Non-streaming: one `Request` when the call goes out, then exactly one of
/// `Completion`, `Retry` (followed by another cycle), or `Error`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelEvent {
    provider: String,
    stage_id: Option<String>,
    scope: ModelEventScope,
    message: String,
    metadata: FxHashMap<String, Value>,
    timestamp: DateTime<Utc>,
}

impl ModelEvent {
    pub fn new(
        provider: impl Into<String>,
        stage_id: Option<String>,
        scope: ModelEventScope,
        message: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            stage_id,
            scope,
            message: message.into(),
            metadata: FxHashMap::default(),
            timestamp: Utc::now(),
        }
    }

    pub fn request(provider: impl Into<String>, stage_id: Option<String>) -> Self {
        Self::new(provider, stage_id, ModelEventScope::Request, "request sent")
    }

    pub fn completion(
        provider: impl Into<String>,
        stage_id: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(provider, stage_id, ModelEventScope::Completion, message)
    }

    pub fn retry(
        provider: impl Into<String>,
        stage_id: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(provider, stage_id, ModelEventScope::Retry, message)
    }

    pub fn error(
        provider: impl Into<String>,
        stage_id: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        let mut event = Self::new(provider, stage_id, ModelEventScope::Error, message);
        event
            .metadata
            .insert("severity".to_string(), Value::String("error".to_string()));
        event
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn stage_id(&self) -> Option<&str> {
        self.stage_id.as_deref()
    }

    pub fn scope(&self) -> &ModelEventScope {
        &self.scope
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn metadata(&self) -> &FxHashMap<String, Value> {
        &self.metadata
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn with_metadata(mut self, metadata: FxHashMap<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    /// Display renders stage metadata in the "[id@turn]" form used by sinks.
    fn test_display_forms() {
        let with_meta = Event::stage_message_with_meta("router", 2, "routing", "picked inventory");
        assert_eq!(with_meta.to_string(), "[router@2] picked inventory");

        let bare = Event::stage_message("routing", "picked inventory");
        assert_eq!(bare.to_string(), "picked inventory");

        let model = Event::Model(ModelEvent::completion("openai", None, "ok"));
        assert_eq!(model.to_string(), "[model openai] ok");
    }

    #[test]
    /// Normalized JSON carries the variant-specific metadata object.
    fn test_to_json_value_metadata() {
        let event = Event::Model(
            ModelEvent::retry("openai", Some("expert:general".to_string()), "retrying after 502"),
        );
        let json = event.to_json_value();
        assert_eq!(json["type"], "model");
        assert_eq!(json["scope"], "retry");
        assert_eq!(json["metadata"]["provider"], "openai");
        assert_eq!(json["metadata"]["stage_id"], "expert:general");
    }
}
