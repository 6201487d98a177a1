//! Hierarchical memory manager.
//!
//! Owns the three-tier memory representation for a node:
//! - **core context** is the founding statement, written once at node
//!   creation and never recompressed
//! - **working memory** is an append-only buffer of recent turns,
//!   replaced by a compressed summary when either trigger fires
//! - **key facts** are maintained by the [`FactStore`] during compression
//!
//! Context assembly orders material by decreasing stability: core context,
//! then trusted facts, then recent detail, then very-recent unfolded
//! messages.

use crate::facts::FactStore;
use colloquy_config::MemoryConfig;
use colloquy_core::node::{FactSource, KeyFact, NodeMemory};
use colloquy_core::provider::{CompletionRequest, Provider};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct MemoryManager {
    provider: Arc<dyn Provider>,
    config: MemoryConfig,
    facts: FactStore,
}

impl MemoryManager {
    pub fn new(provider: Arc<dyn Provider>, config: MemoryConfig) -> Self {
        let facts = FactStore::new(provider.clone(), config.clone());
        Self {
            provider,
            config,
            facts,
        }
    }

    /// Seed a fresh memory for a new node.
    ///
    /// The description, when present, becomes both part of the core
    /// context and the node's founding USER_STATED fact, so the premise
    /// the node was created on carries provenance like any other claim.
    pub fn initialize_memory(&self, topic: &str, description: Option<&str>) -> NodeMemory {
        let core_context = match description {
            Some(description) => format!("Topic: {topic}\nInitial Context: {description}"),
            None => format!("Topic: {topic}"),
        };

        let key_facts = match description {
            Some(description) => vec![KeyFact::new(description, FactSource::UserStated)],
            None => Vec::new(),
        };

        NodeMemory {
            core_context,
            working_memory: String::new(),
            key_facts,
            message_count: 0,
            last_summary_at: 0,
        }
    }

    /// Fold one turn into working memory and bump the message counter.
    ///
    /// Returns true when the fold tipped the memory over a compression
    /// trigger; the caller decides when to actually run compression.
    pub fn add_message(
        &self,
        memory: &mut NodeMemory,
        content: &str,
        reply: Option<&str>,
    ) -> bool {
        let turn = match reply {
            Some(reply) => format!("User: {content}\nAssistant: {reply}"),
            None => format!("User: {content}"),
        };

        if !memory.working_memory.is_empty() {
            memory.working_memory.push('\n');
        }
        memory.working_memory.push_str(&turn);
        memory.message_count += 1;

        self.should_compress(memory)
    }

    /// Either trigger alone is sufficient: a single very long turn must
    /// compress even before the turn-count threshold is reached.
    pub fn should_compress(&self, memory: &NodeMemory) -> bool {
        memory.messages_since_summary() >= self.config.working_memory_limit
            || memory.estimated_tokens() > self.config.max_token_estimate
    }

    /// Compress working memory: extract/merge facts, then replace the
    /// buffer with a provider summary.
    ///
    /// Core context is never part of what gets summarized. On provider
    /// failure the buffer degrades to its most recent half rather than
    /// being lost.
    pub async fn compress_memory(&self, memory: &mut NodeMemory, model: &str) {
        info!(
            messages = memory.messages_since_summary(),
            estimated_tokens = memory.estimated_tokens(),
            "Compressing working memory"
        );

        let existing = std::mem::take(&mut memory.key_facts);
        memory.key_facts = self
            .facts
            .extract_and_merge_key_facts(
                existing,
                &memory.working_memory,
                &memory.core_context,
                model,
            )
            .await;

        memory.working_memory = self.summarize(&memory.working_memory, model).await;
        memory.last_summary_at = memory.message_count;
    }

    /// Assemble the provider-facing context string.
    ///
    /// `recent_messages` are turns not yet folded into working memory;
    /// only the last 5 are shown.
    pub fn get_context(&self, memory: &NodeMemory, recent_messages: &[String]) -> String {
        let mut sections = vec![memory.core_context.clone()];

        let display_facts: Vec<&KeyFact> = memory
            .key_facts
            .iter()
            .filter(|f| f.confidence >= self.config.min_display_confidence)
            .take(self.config.context_fact_limit)
            .collect();
        if !display_facts.is_empty() {
            let mut block = String::from("KEY FACTS:");
            for fact in display_facts {
                block.push_str(&format!(
                    "\n- {} (confidence: {:.0}%)",
                    fact.content,
                    fact.confidence * 100.0
                ));
            }
            sections.push(block);
        }

        if !memory.working_memory.is_empty() {
            sections.push(format!("RECENT CONTEXT:\n{}", memory.working_memory));
        }

        let latest: Vec<&String> = recent_messages.iter().rev().take(5).rev().collect();
        if !latest.is_empty() {
            let mut block = String::from("LATEST MESSAGES:");
            for message in latest {
                block.push_str(&format!("\n- {message}"));
            }
            sections.push(block);
        }

        sections.join("\n\n")
    }

    async fn summarize(&self, working_memory: &str, model: &str) -> String {
        let prompt = format!(
            "Compress the following conversation into a concise summary that \
             preserves decisions, commitments, and open questions. Keep it \
             short; drop pleasantries and repetition.\n\n\
             CONVERSATION:\n{working_memory}\n\n\
             Summary:"
        );

        let request = CompletionRequest::new(
            prompt,
            "You are a conversation summarizer. Return only the summary text.",
            model,
        );

        match self.provider.complete(request).await {
            Ok(response) => {
                debug!("Working memory summarized by provider");
                response.content.trim().to_string()
            }
            Err(e) => {
                warn!(error = %e, "Summary call failed, truncating working memory");
                truncate_last_half(working_memory)
            }
        }
    }
}

/// Deterministic fallback when summarization fails: keep the most recent
/// half of the buffer's lines (at least one, so a single long turn is
/// never erased outright).
fn truncate_last_half(working_memory: &str) -> String {
    if working_memory.is_empty() {
        return String::new();
    }
    let lines: Vec<&str> = working_memory.lines().collect();
    let keep = (lines.len() / 2).max(1);
    lines[lines.len() - keep..].join("\n")
}
