//! Chat model seam.
//!
//! Experts never talk to a completion endpoint directly; they go through
//! [`ChatModel`]. The trait ships with one production implementation
//! ([`HttpChatModel`], OpenAI-compatible) and one test double
//! ([`ScriptedChatModel`]) that replays canned replies and records the
//! requests it saw.
//!
//! Transient failures get exactly one retry with a short jittered delay via
//! [`ChatModel::complete_with_retry`]. Anything beyond that is the
//! orchestrator's problem: it decides whether a failed expert falls back.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use miette::Diagnostic;
use rand::Rng;
use serde::Deserialize;
use thiserror::Error;

use crate::message::Message;

const RETRY_BASE_DELAY_MS: u64 = 200;
const RETRY_JITTER_MS: u64 = 250;

/// Errors from chat model providers.
#[derive(Debug, Error, Diagnostic)]
pub enum ChatError {
    /// The provider endpoint answered with a non-success status.
    #[error("chat endpoint returned {status}: {message}")]
    #[diagnostic(code(switchboard::model::http))]
    Http { status: u16, message: String },

    /// The request never completed (connect failure, timeout, TLS).
    #[error("chat transport error: {0}")]
    #[diagnostic(
        code(switchboard::model::transport),
        help("Check the chat endpoint URL and network reachability.")
    )]
    Transport(#[from] reqwest::Error),

    /// The endpoint answered 2xx but the body was not the expected shape.
    #[error("malformed chat response: {0}")]
    #[diagnostic(code(switchboard::model::malformed_response))]
    MalformedResponse(String),

    /// A scripted model ran out of canned replies.
    #[error("scripted model has no reply left for this request")]
    #[diagnostic(code(switchboard::model::script_exhausted))]
    ScriptExhausted,
}

impl ChatError {
    /// Whether a single immediate retry has a chance of succeeding.
    ///
    /// Rate limits and server-side errors are worth one more attempt;
    /// malformed responses and client errors are not.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            ChatError::Transport(_) => true,
            ChatError::Http { status, .. } => matches!(status, 429 | 500..=599),
            ChatError::MalformedResponse(_) | ChatError::ScriptExhausted => false,
        }
    }
}

/// A single completion request: system prompt, prior turns, current query.
///
/// # Examples
///
/// ```rust
/// use switchboard::message::Message;
/// use switchboard::model::ChatRequest;
///
/// let request = ChatRequest::new("what is NVLink?")
///     .with_system("You answer questions about AI hardware.")
///     .with_history(vec![Message::user("hi"), Message::assistant("hello")]);
/// assert_eq!(request.to_messages().len(), 4);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChatRequest {
    /// Optional system prompt placed first.
    pub system: Option<String>,
    /// Prior conversation turns, oldest first.
    pub history: Vec<Message>,
    /// The current user query, placed last.
    pub user: String,
}

impl ChatRequest {
    #[must_use]
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            system: None,
            history: Vec::new(),
            user: user.into(),
        }
    }

    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    #[must_use]
    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }

    /// Flatten into the message sequence sent to the provider.
    #[must_use]
    pub fn to_messages(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.history.len() + 2);
        if let Some(system) = &self.system {
            messages.push(Message::system(system));
        }
        messages.extend(self.history.iter().cloned());
        messages.push(Message::user(&self.user));
        messages
    }
}

/// Produces a completion for a chat request.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Stable identifier of the backing provider (for events and logs).
    fn provider_id(&self) -> &str;

    /// Complete a request, returning the assistant text.
    async fn complete(&self, request: &ChatRequest) -> Result<String, ChatError>;

    /// Complete with one retry on transient failure.
    ///
    /// The retry waits `200ms` plus up to `250ms` of jitter so that
    /// concurrent turns do not hammer a recovering endpoint in lockstep.
    async fn complete_with_retry(&self, request: &ChatRequest) -> Result<String, ChatError> {
        match self.complete(request).await {
            Ok(text) => Ok(text),
            Err(err) if err.is_retryable() => {
                let delay = Duration::from_millis(
                    RETRY_BASE_DELAY_MS + rand::rng().random_range(0..RETRY_JITTER_MS),
                );
                tracing::warn!(
                    provider = self.provider_id(),
                    error = %err,
                    delay_ms = delay.as_millis() as u64,
                    "model call failed, retrying once"
                );
                tokio::time::sleep(delay).await;
                self.complete(request).await
            }
            Err(err) => Err(err),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// Chat model backed by an OpenAI-compatible `/chat/completions` endpoint.
///
/// # Examples
///
/// ```rust,no_run
/// use switchboard::model::HttpChatModel;
///
/// let model = HttpChatModel::new("https://api.openai.com/v1", "sk-...", "gpt-4o-mini")
///     .with_temperature(0.1);
/// ```
pub struct HttpChatModel {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: Option<f32>,
}

impl HttpChatModel {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            temperature: None,
        }
    }

    /// Use a preconfigured client (timeouts, proxies).
    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Set the sampling temperature (omitted from the request when unset).
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

#[async_trait]
impl ChatModel for HttpChatModel {
    fn provider_id(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String, ChatError> {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": request.to_messages(),
        });
        if let Some(temperature) = self.temperature {
            body["temperature"] = serde_json::json!(temperature);
        }

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ChatError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ChatError::MalformedResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| ChatError::MalformedResponse("no choices in response".to_string()))
    }
}

#[derive(Clone, Debug)]
enum Script {
    Reply(String),
    Fail { status: u16, message: String },
}

/// Test double that replays canned replies in order.
///
/// Records every request it receives; tests assert on the snapshot to check
/// what prompt and history an expert actually sent. When the script runs
/// dry, the optional default reply (if set) is returned indefinitely,
/// otherwise [`ChatError::ScriptExhausted`].
///
/// # Examples
///
/// ```rust
/// use switchboard::model::ScriptedChatModel;
///
/// let model = ScriptedChatModel::new()
///     .with_reply("first answer")
///     .with_failure(503, "upstream melting")
///     .with_default_reply("anything after that");
/// ```
#[derive(Clone, Default)]
pub struct ScriptedChatModel {
    script: Arc<Mutex<VecDeque<Script>>>,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
    default_reply: Option<String>,
}

impl ScriptedChatModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply.
    #[must_use]
    pub fn with_reply(self, text: impl Into<String>) -> Self {
        self.script.lock().expect("script mutex poisoned").push_back(Script::Reply(text.into()));
        self
    }

    /// Queue a failure with the given HTTP status.
    #[must_use]
    pub fn with_failure(self, status: u16, message: impl Into<String>) -> Self {
        self.script.lock().expect("script mutex poisoned").push_back(Script::Fail {
            status,
            message: message.into(),
        });
        self
    }

    /// Reply with this text whenever the script is empty.
    #[must_use]
    pub fn with_default_reply(mut self, text: impl Into<String>) -> Self {
        self.default_reply = Some(text.into());
        self
    }

    /// Snapshot of every request received so far.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().expect("request log poisoned").clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedChatModel {
    fn provider_id(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String, ChatError> {
        self.requests.lock().expect("request log poisoned").push(request.clone());
        let next = self.script.lock().expect("script mutex poisoned").pop_front();
        match next {
            Some(Script::Reply(text)) => Ok(text),
            Some(Script::Fail { status, message }) => Err(ChatError::Http { status, message }),
            None => match &self.default_reply {
                Some(text) => Ok(text.clone()),
                None => Err(ChatError::ScriptExhausted),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    /// Scripted replies come back in queue order and requests are recorded.
    async fn test_scripted_replay_order() {
        let model = ScriptedChatModel::new().with_reply("one").with_reply("two");

        let first = model.complete(&ChatRequest::new("a")).await.unwrap();
        let second = model.complete(&ChatRequest::new("b")).await.unwrap();
        assert_eq!(first, "one");
        assert_eq!(second, "two");

        let requests = model.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].user, "a");
        assert_eq!(requests[1].user, "b");
    }

    #[tokio::test]
    /// An empty script without a default reply surfaces ScriptExhausted.
    async fn test_script_exhausted() {
        let model = ScriptedChatModel::new();
        let err = model.complete(&ChatRequest::new("q")).await.unwrap_err();
        assert!(matches!(err, ChatError::ScriptExhausted));
        assert!(!err.is_retryable());
    }

    #[tokio::test(start_paused = true)]
    /// A retryable failure gets exactly one more attempt.
    async fn test_retry_recovers_from_transient_failure() {
        let model = ScriptedChatModel::new()
            .with_failure(503, "upstream melting")
            .with_reply("recovered");

        let text = model
            .complete_with_retry(&ChatRequest::new("q"))
            .await
            .unwrap();
        assert_eq!(text, "recovered");
        assert_eq!(model.requests().len(), 2);
    }

    #[tokio::test]
    /// Client errors are not retried.
    async fn test_no_retry_on_client_error() {
        let model = ScriptedChatModel::new()
            .with_failure(400, "bad request")
            .with_reply("never seen");

        let err = model
            .complete_with_retry(&ChatRequest::new("q"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Http { status: 400, .. }));
        assert_eq!(model.requests().len(), 1, "400 must not trigger a retry");
    }

    #[tokio::test(start_paused = true)]
    /// Two consecutive retryable failures exhaust the single-retry budget.
    async fn test_retry_budget_is_one() {
        let model = ScriptedChatModel::new()
            .with_failure(503, "first")
            .with_failure(503, "second")
            .with_reply("never reached");

        let err = model
            .complete_with_retry(&ChatRequest::new("q"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Http { status: 503, .. }));
        assert_eq!(model.requests().len(), 2, "exactly one retry allowed");
    }
}
