use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A message in a conversation, carrying a role and text content.
///
/// Everything conversational moves as `Message` values: the query a caller
/// submits, the answer an expert returns, and the system prompts experts
/// feed their chat models.
///
/// # Examples
/// ```
/// use switchboard::message::Message;
///
/// let query = Message::user("List powered-off servers");
/// let answer = Message::assistant("3 servers are powered off.");
/// let prompt = Message::system("You are a datacenter inventory specialist.");
/// assert!(query.has_role(Message::USER));
/// ```
///
/// Messages serialize to JSON and round-trip intact:
/// ```
/// use switchboard::message::Message;
///
/// let msg = Message::user("show fabric health");
/// let json = serde_json::to_string(&msg).unwrap();
/// let parsed: Message = serde_json::from_str(&json).unwrap();
/// assert_eq!(msg, parsed);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Message {
    /// Who sent it: one of the role constants, or a custom label.
    pub role: String,
    /// The message body as plain text.
    pub content: String,
}

impl Message {
    /// Caller query role.
    pub const USER: &'static str = "user";
    /// Expert answer role.
    pub const ASSISTANT: &'static str = "assistant";
    /// Model instruction role.
    pub const SYSTEM: &'static str = "system";

    /// Build a message with an arbitrary role.
    ///
    /// # Examples
    /// ```
    /// use switchboard::message::Message;
    ///
    /// let msg = Message::new(Message::USER, "any major alarms today?");
    /// assert_eq!(msg.role, "user");
    /// assert_eq!(msg.content, "any major alarms today?");
    /// ```
    #[must_use]
    pub fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }

    /// A message from the caller.
    #[must_use]
    pub fn user(content: &str) -> Self {
        Self::new(Self::USER, content)
    }

    /// An answer produced by an expert.
    #[must_use]
    pub fn assistant(content: &str) -> Self {
        Self::new(Self::ASSISTANT, content)
    }

    /// An instruction for a chat model.
    #[must_use]
    pub fn system(content: &str) -> Self {
        Self::new(Self::SYSTEM, content)
    }

    /// Whether this message carries `role`.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.role == role
    }
}

/// A message paired with the moment it entered the session.
///
/// Session history is a sequence of turns in arrival order. The timestamp is
/// assigned by the pipeline when the turn is recorded, not by the caller, so
/// histories from a single session are monotonically non-decreasing.
///
/// # Examples
/// ```
/// use switchboard::message::{ConversationTurn, Message};
///
/// let turn = ConversationTurn::now(Message::user("list sites"));
/// assert!(turn.message.has_role(Message::USER));
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// The message exchanged on this turn.
    pub message: Message,
    /// When the pipeline recorded the turn (UTC).
    pub at: DateTime<Utc>,
}

impl ConversationTurn {
    /// Records a turn timestamped at the current instant.
    #[must_use]
    pub fn now(message: Message) -> Self {
        Self {
            message,
            at: Utc::now(),
        }
    }

    /// Records a turn with an explicit timestamp.
    ///
    /// Useful when replaying persisted histories.
    #[must_use]
    pub fn at(message: Message, at: DateTime<Utc>) -> Self {
        Self { message, at }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    /// Constructors cover the three standard roles plus arbitrary ones.
    fn test_constructors_set_role_and_content() {
        let query = Message::user("any critical alarms?");
        assert_eq!(query.role, Message::USER);
        assert_eq!(query.content, "any critical alarms?");

        let answer = Message::assistant("No critical alarms in the last 24 hours.");
        assert_eq!(answer.role, Message::ASSISTANT);

        let prompt = Message::system("You answer questions about network fabrics.");
        assert_eq!(prompt.role, Message::SYSTEM);

        let custom = Message::new("tool", "{\"servers\": 12}");
        assert_eq!(custom.role, "tool");
        assert_eq!(custom.content, "{\"servers\": 12}");
    }

    #[test]
    fn test_has_role_matches_standard_and_custom_roles() {
        let query = Message::user("hello");
        assert!(query.has_role(Message::USER));
        assert!(!query.has_role(Message::ASSISTANT));
        assert!(!query.has_role(Message::SYSTEM));

        let custom = Message::new("tool", "result");
        assert!(custom.has_role("tool"));
        assert!(!custom.has_role(Message::USER));
    }

    #[test]
    fn test_json_round_trip_preserves_the_message() {
        let original = Message::user("show device connectors");
        let json = serde_json::to_string(&original).expect("serialize");
        let parsed: Message = serde_json::from_str(&json).expect("deserialize");

        assert_eq!(original, parsed);
        assert_eq!(parsed.role, "user");
        assert_eq!(parsed.content, "show device connectors");
    }

    #[test]
    /// Turns recorded in sequence carry non-decreasing timestamps.
    fn test_turn_timestamps_are_ordered() {
        let first = ConversationTurn::now(Message::user("first"));
        let second = ConversationTurn::now(Message::assistant("second"));
        assert!(first.at <= second.at);
    }

    #[test]
    /// Explicit timestamps survive a serde round trip.
    fn test_turn_serialization() {
        let at = Utc::now();
        let turn = ConversationTurn::at(Message::assistant("done"), at);
        let json = serde_json::to_string(&turn).expect("serialize");
        let parsed: ConversationTurn = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed.at, at);
        assert_eq!(parsed.message.content, "done");
    }
}
