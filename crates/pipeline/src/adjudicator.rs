//! Adjudication engine.
//!
//! Builds one prompt from a node's memory and a candidate message, asks
//! the provider for a relevance/staleness judgment in a fixed JSON shape,
//! and decodes it strictly. Any failure — provider error, timeout,
//! undecodable payload — resolves to the conservative fallback verdict
//! without retry: on ambiguity the system rejects, because accepting is
//! the only irreversible, cost-bearing branch.
//!
//! Stateless across calls; the provider call is the only side effect.

use colloquy_config::AdjudicationConfig;
use colloquy_core::json::strip_code_fences;
use colloquy_core::message::{AdjudicationResult, Message};
use colloquy_core::node::Node;
use colloquy_core::provider::{CompletionRequest, Provider};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub struct Adjudicator {
    provider: Arc<dyn Provider>,
    config: AdjudicationConfig,
}

impl Adjudicator {
    pub fn new(provider: Arc<dyn Provider>, config: AdjudicationConfig) -> Self {
        Self { provider, config }
    }

    /// Judge one message against a node's current memory.
    ///
    /// Infallible by construction: every failure path collapses into the
    /// fallback verdict, with the reason recorded on the verdict itself.
    pub async fn adjudicate(&self, message: &Message, node: &Node) -> AdjudicationResult {
        let prompt = self.build_prompt(message, node);
        let request = CompletionRequest::new(
            prompt,
            "You are a message adjudication system. Return only valid JSON.",
            &node.model,
        );

        let timeout = Duration::from_secs(self.config.timeout_secs);
        let response = match tokio::time::timeout(timeout, self.provider.complete(request)).await
        {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!(message_id = %message.id, error = %e, "Adjudication call failed");
                return AdjudicationResult::fallback(
                    &message.id,
                    format!("provider failure: {e}"),
                );
            }
            Err(_) => {
                warn!(
                    message_id = %message.id,
                    timeout_secs = self.config.timeout_secs,
                    "Adjudication call timed out"
                );
                return AdjudicationResult::fallback(&message.id, "provider timeout");
            }
        };

        if let Some(usage) = &response.usage {
            debug!(
                message_id = %message.id,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Adjudication token usage"
            );
        }

        let payload = strip_code_fences(&response.content);
        match serde_json::from_str::<RawVerdict>(payload) {
            Ok(raw) => AdjudicationResult {
                message_id: message.id.clone(),
                is_relevant: raw.is_relevant,
                is_stale: raw.is_stale,
                reason: raw.reason,
                score: raw.score.clamp(0.0, 1.0),
            },
            Err(e) => {
                warn!(message_id = %message.id, error = %e, "Adjudication verdict unparseable");
                AdjudicationResult::fallback(&message.id, format!("unparseable verdict: {e}"))
            }
        }
    }

    fn build_prompt(&self, message: &Message, node: &Node) -> String {
        let mut facts_block = String::new();
        for fact in node.memory.key_facts.iter().take(self.config.fact_limit) {
            facts_block.push_str(&format!(
                "- {} (confidence: {:.0}%)\n",
                fact.content,
                fact.confidence * 100.0
            ));
        }
        if facts_block.is_empty() {
            facts_block.push_str("(none yet)\n");
        }

        format!(
            "Judge whether a new message belongs in a topic-scoped conversation.\n\n\
             CORE CONTEXT:\n{core}\n\n\
             KNOWN FACTS:\n{facts}\n\
             RECENT CONVERSATION:\n{working}\n\n\
             The sender last saw version {target} of this conversation; it is \
             now at version {current}.\n\n\
             NEW MESSAGE from {user}:\n{content}\n\n\
             Decide:\n\
             - isRelevant: does the message contribute to the core topic?\n\
             - isStale: does it only repeat what is already known, or respond \
             to a state of the conversation that has since moved on?\n\
             - reason: one sentence\n\
             - score: your confidence in this judgment, 0.0 to 1.0\n\n\
             Return only JSON: {{\"isRelevant\": bool, \"isStale\": bool, \
             \"reason\": string, \"score\": number}}",
            core = node.memory.core_context,
            facts = facts_block,
            working = node.memory.working_memory,
            target = message.target_node_version,
            current = node.version,
            user = message.user_id,
            content = message.content,
        )
    }
}

/// The provider's verdict payload, decoded strictly.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawVerdict {
    is_relevant: bool,
    is_stale: bool,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    score: f64,
}
