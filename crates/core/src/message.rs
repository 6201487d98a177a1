//! Message, envelope, and verdict domain types.
//!
//! A `Message` is a single contribution awaiting or having received a
//! verdict. A `QueueMessage` is the transport envelope that carries enough
//! to re-fetch authoritative state — it is not itself authoritative. An
//! `AdjudicationResult` is the verdict, consumed immediately and never
//! persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a message.
///
/// `Pending` → `Adjudicating` (transient, never persisted) →
/// one of the terminal states, exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageStatus {
    Pending,
    Adjudicating,
    Accepted,
    Rejected,
    Stale,
}

impl MessageStatus {
    /// Terminal states never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MessageStatus::Accepted | MessageStatus::Rejected | MessageStatus::Stale
        )
    }
}

impl std::fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MessageStatus::Pending => "PENDING",
            MessageStatus::Adjudicating => "ADJUDICATING",
            MessageStatus::Accepted => "ACCEPTED",
            MessageStatus::Rejected => "REJECTED",
            MessageStatus::Stale => "STALE",
        };
        f.write_str(s)
    }
}

/// A single contribution to a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// The contribution text
    pub content: String,

    /// Who sent it
    pub user_id: String,

    /// Which node it targets
    pub node_id: String,

    /// The node version the sender believed was current
    pub target_node_version: u64,

    /// Lifecycle status — the only field the pipeline mutates
    pub status: MessageStatus,

    /// When the message was created
    pub created_at: DateTime<Utc>,
}

/// Transport envelope for a queued message.
///
/// Enqueue uses `node_id` as the ordering/partition key and `message_id`
/// as the deduplication key, so redelivery never double-processes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueMessage {
    pub message_id: String,
    pub node_id: String,
    pub target_node_version: u64,
    pub content: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl QueueMessage {
    /// Build an envelope from an authoritative message record.
    pub fn from_message(message: &Message) -> Self {
        Self {
            message_id: message.id.clone(),
            node_id: message.node_id.clone(),
            target_node_version: message.target_node_version,
            content: message.content.clone(),
            user_id: message.user_id.clone(),
            timestamp: Some(message.created_at.timestamp_millis()),
        }
    }
}

/// The verdict on a single message against a node's current memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjudicationResult {
    pub message_id: String,
    pub is_relevant: bool,
    pub is_stale: bool,
    pub reason: String,
    /// Verdict confidence in [0, 1]
    pub score: f64,
}

impl AdjudicationResult {
    /// Map a verdict to a terminal status.
    ///
    /// Staleness overrides relevance: a stale-but-relevant message still
    /// contributes nothing new.
    pub fn terminal_status(&self) -> MessageStatus {
        if self.is_stale {
            MessageStatus::Stale
        } else if self.is_relevant {
            MessageStatus::Accepted
        } else {
            MessageStatus::Rejected
        }
    }

    /// The conservative fallback verdict used when the provider fails,
    /// times out, or answers unparseably. Rejects rather than accepts,
    /// since accepting is the only irreversible, cost-bearing branch.
    pub fn fallback(message_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            is_relevant: false,
            is_stale: true,
            reason: reason.into(),
            score: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(!MessageStatus::Pending.is_terminal());
        assert!(!MessageStatus::Adjudicating.is_terminal());
        assert!(MessageStatus::Accepted.is_terminal());
        assert!(MessageStatus::Rejected.is_terminal());
        assert!(MessageStatus::Stale.is_terminal());
    }

    #[test]
    fn staleness_overrides_relevance() {
        let verdict = AdjudicationResult {
            message_id: "m1".into(),
            is_relevant: true,
            is_stale: true,
            reason: "repeats known facts".into(),
            score: 0.8,
        };
        assert_eq!(verdict.terminal_status(), MessageStatus::Stale);
    }

    #[test]
    fn relevant_fresh_message_is_accepted() {
        let verdict = AdjudicationResult {
            message_id: "m1".into(),
            is_relevant: true,
            is_stale: false,
            reason: "new information".into(),
            score: 0.9,
        };
        assert_eq!(verdict.terminal_status(), MessageStatus::Accepted);
    }

    #[test]
    fn irrelevant_message_is_rejected() {
        let verdict = AdjudicationResult {
            message_id: "m1".into(),
            is_relevant: false,
            is_stale: false,
            reason: "off topic".into(),
            score: 0.7,
        };
        assert_eq!(verdict.terminal_status(), MessageStatus::Rejected);
    }

    #[test]
    fn fallback_verdict_shape() {
        let verdict = AdjudicationResult::fallback("m1", "provider unreachable");
        assert!(!verdict.is_relevant);
        assert!(verdict.is_stale);
        assert_eq!(verdict.score, 0.0);
        assert_eq!(verdict.terminal_status(), MessageStatus::Stale);
    }

    #[test]
    fn queue_message_round_trips_camel_case() {
        let envelope = QueueMessage {
            message_id: "m1".into(),
            node_id: "n1".into(),
            target_node_version: 3,
            content: "hello".into(),
            user_id: "u1".into(),
            timestamp: None,
        };
        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.contains("\"messageId\""));
        assert!(json.contains("\"targetNodeVersion\""));
        let back: QueueMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back.node_id, "n1");
        assert_eq!(back.target_node_version, 3);
    }

    #[test]
    fn envelope_from_message_carries_ids() {
        let message = Message {
            id: "m1".into(),
            content: "hello".into(),
            user_id: "u1".into(),
            node_id: "n1".into(),
            target_node_version: 2,
            status: MessageStatus::Pending,
            created_at: Utc::now(),
        };
        let envelope = QueueMessage::from_message(&message);
        assert_eq!(envelope.message_id, "m1");
        assert_eq!(envelope.node_id, "n1");
        assert!(envelope.timestamp.is_some());
    }
}
