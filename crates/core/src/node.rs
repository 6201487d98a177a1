//! Node and memory domain types.
//!
//! A `Node` is a topic-scoped, versioned conversation thread. Its memory is
//! a three-tier representation:
//! - **core context**: the founding statement, set once, never recompressed
//! - **working memory**: append-only recent turns, periodically compressed
//! - **key facts**: confidence-scored, provenance-tagged atomic claims

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A topic-scoped conversation thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Unique node ID
    pub id: String,

    /// The topic this node is scoped to
    pub topic: String,

    /// Free-form description of the node's purpose
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Which provider model adjudicates and summarizes for this node
    pub model: String,

    /// The three-tier memory representation
    pub memory: NodeMemory,

    /// Optimistic-concurrency token. Monotonically non-decreasing;
    /// incremented exactly once per accepted memory update, and only by
    /// the store's `update_node` path.
    pub version: u64,

    /// When this node was created
    pub created_at: DateTime<Utc>,

    /// When this node was last updated
    pub updated_at: DateTime<Utc>,
}

impl Node {
    /// Create a new node at version 1 with the given memory.
    pub fn new(
        topic: impl Into<String>,
        description: Option<String>,
        model: impl Into<String>,
        memory: NodeMemory,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            topic: topic.into(),
            description,
            model: model.into(),
            memory,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }
}

/// The three-tier memory owned exclusively by one node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeMemory {
    /// The immutable founding statement. Set at creation, never mutated
    /// by compression.
    pub core_context: String,

    /// Append-only buffer of recent turns, replaced by a compressed
    /// summary when compression runs.
    pub working_memory: String,

    /// Confidence-sorted (descending), size-bounded fact set.
    #[serde(default)]
    pub key_facts: Vec<KeyFact>,

    /// Incremented once per folded message.
    pub message_count: u64,

    /// The `message_count` value at the most recent compression.
    pub last_summary_at: u64,
}

impl NodeMemory {
    /// Messages folded since the last compression pass.
    pub fn messages_since_summary(&self) -> u64 {
        self.message_count.saturating_sub(self.last_summary_at)
    }

    /// Rough token estimate for the working memory (~4 chars per token).
    pub fn estimated_tokens(&self) -> usize {
        self.working_memory.len() / 4
    }
}

/// Provenance of a key fact — who asserted it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FactSource {
    /// Stated directly by a user
    UserStated,
    /// Stated by a user and later confirmed
    UserConfirmed,
    /// Inferred by the model during extraction
    LlmInferred,
    /// Implied by conversation flow, never stated
    Implicit,
}

impl FactSource {
    /// The initial confidence weight for a fact from this source.
    ///
    /// An exhaustive match so that adding a new source is a
    /// compile-time-checked decision point.
    pub fn base_weight(&self) -> f64 {
        match self {
            FactSource::UserStated => 0.9,
            FactSource::UserConfirmed => 1.0,
            FactSource::LlmInferred => 0.6,
            FactSource::Implicit => 0.4,
        }
    }
}

/// A single factual claim with provenance and trust level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyFact {
    /// Unique fact ID
    pub id: String,

    /// The claim text
    pub content: String,

    /// Trust level in [0, 1]. Clamped at every write.
    pub confidence: f64,

    /// Who asserted this claim
    pub source: FactSource,

    /// When this fact was first extracted
    pub extracted_at: DateTime<Utc>,

    /// When this fact was last confirmed (merge or explicit confirmation)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_confirmed_at: Option<DateTime<Utc>>,

    /// Quotes or context supporting the claim
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supporting_evidence: Vec<String>,

    /// Lazily populated, normalized embedding vector
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
}

impl KeyFact {
    /// Create a fact with the source's base confidence weight.
    pub fn new(content: impl Into<String>, source: FactSource) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            confidence: source.base_weight(),
            source,
            extracted_at: Utc::now(),
            last_confirmed_at: None,
            supporting_evidence: Vec::new(),
            embedding: None,
        }
    }

    /// Set confidence, clamped to [0, 1].
    pub fn set_confidence(&mut self, confidence: f64) {
        self.confidence = confidence.clamp(0.0, 1.0);
    }

    /// The timestamp temporal decay is anchored to: last confirmation if
    /// present, otherwise extraction time.
    pub fn decay_anchor(&self) -> DateTime<Utc> {
        self.last_confirmed_at.unwrap_or(self.extracted_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_weights() {
        assert_eq!(FactSource::UserStated.base_weight(), 0.9);
        assert_eq!(FactSource::UserConfirmed.base_weight(), 1.0);
        assert_eq!(FactSource::LlmInferred.base_weight(), 0.6);
        assert_eq!(FactSource::Implicit.base_weight(), 0.4);
    }

    #[test]
    fn new_fact_uses_source_weight() {
        let fact = KeyFact::new("Ship v2 by Friday", FactSource::UserStated);
        assert_eq!(fact.confidence, 0.9);
        assert!(fact.last_confirmed_at.is_none());
        assert!(fact.supporting_evidence.is_empty());
    }

    #[test]
    fn set_confidence_clamps() {
        let mut fact = KeyFact::new("x", FactSource::Implicit);
        fact.set_confidence(1.7);
        assert_eq!(fact.confidence, 1.0);
        fact.set_confidence(-0.3);
        assert_eq!(fact.confidence, 0.0);
    }

    #[test]
    fn decay_anchor_prefers_confirmation() {
        let mut fact = KeyFact::new("x", FactSource::LlmInferred);
        assert_eq!(fact.decay_anchor(), fact.extracted_at);
        let confirmed = Utc::now();
        fact.last_confirmed_at = Some(confirmed);
        assert_eq!(fact.decay_anchor(), confirmed);
    }

    #[test]
    fn fact_source_serializes_screaming_snake() {
        let json = serde_json::to_string(&FactSource::LlmInferred).unwrap();
        assert_eq!(json, "\"LLM_INFERRED\"");
        let back: FactSource = serde_json::from_str("\"USER_STATED\"").unwrap();
        assert_eq!(back, FactSource::UserStated);
    }

    #[test]
    fn node_starts_at_version_one() {
        let memory = NodeMemory {
            core_context: "Topic: test".into(),
            working_memory: String::new(),
            key_facts: vec![],
            message_count: 0,
            last_summary_at: 0,
        };
        let node = Node::new("test", None, "gpt-4o", memory);
        assert_eq!(node.version, 1);
        assert!(!node.id.is_empty());
    }

    #[test]
    fn memory_counters() {
        let memory = NodeMemory {
            core_context: String::new(),
            working_memory: "x".repeat(40),
            key_facts: vec![],
            message_count: 7,
            last_summary_at: 3,
        };
        assert_eq!(memory.messages_since_summary(), 4);
        assert_eq!(memory.estimated_tokens(), 10);
    }
}
