//! Long-term fact store: extraction, similarity merge, confidence events,
//! temporal decay, and pruning.
//!
//! Invariants enforced here:
//! - confidence is clamped to [0, 1] at every write
//! - merging never decreases an existing fact's confidence and never drops
//!   recorded evidence
//! - the fact set is confidence-sorted descending and capped, with the
//!   sort applied before truncation so the discarded facts are always the
//!   lowest-confidence ones

use chrono::{DateTime, Utc};
use colloquy_config::MemoryConfig;
use colloquy_core::json::strip_code_fences;
use colloquy_core::node::{FactSource, KeyFact};
use colloquy_core::provider::{CompletionRequest, Provider};
use futures::future::join_all;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

const MILLIS_PER_WEEK: f64 = 7.0 * 24.0 * 60.0 * 60.0 * 1000.0;

/// An event that adjusts a fact's confidence.
///
/// Only `TimeDecay` is driven by the compression pipeline itself; the
/// other variants are applied by producer-facing confirmation signals.
#[derive(Debug, Clone, Copy)]
pub enum ConfidenceEvent {
    /// A user explicitly confirmed the fact: +0.3, resets the decay anchor.
    UserConfirmed { at: DateTime<Utc> },
    /// The fact came up again without confirmation: +0.1.
    MentionedAgain,
    /// Contradicting evidence appeared: −0.4, floored at 0.1.
    Contradicted,
    /// Conversation proceeded consistently with the fact: +0.05.
    ImplicitValidation,
    /// Exponential weekly decay anchored to the last confirmation
    /// (or extraction, if never confirmed).
    TimeDecay { now: DateTime<Utc> },
}

/// Apply a confidence event to a fact in place.
///
/// Exhaustive over the event set; the result is always clamped to [0, 1].
pub fn apply_confidence_event(fact: &mut KeyFact, event: ConfidenceEvent, weekly_decay: f64) {
    let updated = match event {
        ConfidenceEvent::UserConfirmed { at } => {
            fact.last_confirmed_at = Some(at);
            (fact.confidence + 0.3).min(1.0)
        }
        ConfidenceEvent::MentionedAgain => (fact.confidence + 0.1).min(1.0),
        ConfidenceEvent::Contradicted => (fact.confidence - 0.4).max(0.1),
        ConfidenceEvent::ImplicitValidation => (fact.confidence + 0.05).min(1.0),
        ConfidenceEvent::TimeDecay { now } => {
            let elapsed_ms = (now - fact.decay_anchor()).num_milliseconds().max(0) as f64;
            let weeks = elapsed_ms / MILLIS_PER_WEEK;
            fact.confidence * weekly_decay.powf(weeks)
        }
    };
    fact.set_confidence(updated);
}

/// The long-term fact store for one process.
///
/// Stateless across calls: the fact set lives in `NodeMemory`; this type
/// owns the extraction/merge/decay/prune algorithm and the provider handle.
pub struct FactStore {
    provider: Arc<dyn Provider>,
    config: MemoryConfig,
}

impl FactStore {
    pub fn new(provider: Arc<dyn Provider>, config: MemoryConfig) -> Self {
        Self { provider, config }
    }

    /// Extract candidate facts from working memory, merge them into the
    /// existing set by embedding similarity, decay everything, and prune.
    ///
    /// Never fails: extraction or embedding errors degrade to "no
    /// candidates" / "no merge" so a compression pass always completes.
    pub async fn extract_and_merge_key_facts(
        &self,
        existing: Vec<KeyFact>,
        working_memory: &str,
        core_context: &str,
        model: &str,
    ) -> Vec<KeyFact> {
        let candidates = self
            .extract_candidates(working_memory, core_context, model)
            .await;
        debug!(candidates = candidates.len(), existing = existing.len(), "Extracted candidate facts");

        let mut facts = existing;

        // Embed in one parallel batch: backfill for existing facts that
        // are missing vectors, plus one vector per candidate. The calls
        // are independent and side-effect-free; only the merge decisions
        // below must stay sequential.
        let backfill_indices: Vec<usize> = facts
            .iter()
            .enumerate()
            .filter(|(_, f)| f.embedding.is_none())
            .map(|(i, _)| i)
            .collect();

        let backfill_texts: Vec<String> = backfill_indices
            .iter()
            .map(|&i| facts[i].content.clone())
            .collect();
        let candidate_texts: Vec<String> =
            candidates.iter().map(|c| c.content.clone()).collect();

        let embeddings = join_all(
            backfill_texts
                .iter()
                .chain(candidate_texts.iter())
                .map(|text| self.embed_or_none(text)),
        )
        .await;

        let (backfill_embeddings, candidate_embeddings) =
            embeddings.split_at(backfill_indices.len());

        for (&index, embedding) in backfill_indices.iter().zip(backfill_embeddings) {
            facts[index].embedding = embedding.clone();
        }

        // Sequential merge: two candidates must not both claim the same
        // existing fact concurrently.
        let now = Utc::now();
        for (candidate, embedding) in candidates.into_iter().zip(candidate_embeddings) {
            let matched = match embedding.as_ref() {
                Some(candidate_embedding) => facts.iter_mut().find(|fact| {
                    fact.embedding
                        .as_ref()
                        .map(|e| {
                            crate::similarity::cosine_similarity(e, candidate_embedding)
                                >= self.config.similarity_threshold
                        })
                        .unwrap_or(false)
                }),
                None => None,
            };

            match matched {
                Some(fact) => {
                    debug!(fact_id = %fact.id, content = %candidate.content, "Merging duplicate fact");
                    fact.set_confidence(fact.confidence + 0.1);
                    fact.supporting_evidence
                        .extend(candidate.supporting_evidence);
                    fact.last_confirmed_at = Some(now);
                }
                None => {
                    let mut fact = KeyFact::new(candidate.content, candidate.source);
                    fact.set_confidence(candidate.confidence);
                    fact.supporting_evidence = candidate.supporting_evidence;
                    fact.embedding = embedding.clone();
                    facts.push(fact);
                }
            }
        }

        // Decay runs on every pass, including facts untouched this round,
        // so unconfirmed facts fade even without contradicting evidence.
        for fact in &mut facts {
            apply_confidence_event(
                fact,
                ConfidenceEvent::TimeDecay { now },
                self.config.weekly_decay,
            );
        }

        self.prune_facts_by_confidence(facts, self.config.min_confidence)
    }

    /// Drop facts below `min_confidence`, sort by confidence descending,
    /// and cap the set. Sorting happens before truncation. Idempotent.
    pub fn prune_facts_by_confidence(
        &self,
        mut facts: Vec<KeyFact>,
        min_confidence: f64,
    ) -> Vec<KeyFact> {
        facts.retain(|f| f.confidence >= min_confidence);
        facts.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        facts.truncate(self.config.max_facts);
        facts
    }

    /// Ask the provider for 3–5 atomic factual claims from the working
    /// memory. Failures yield an empty candidate list, never an error.
    async fn extract_candidates(
        &self,
        working_memory: &str,
        core_context: &str,
        model: &str,
    ) -> Vec<Candidate> {
        let prompt = format!(
            "Extract key facts from the following conversation that are relevant \
             to the core context.\n\n\
             CORE CONTEXT:\n{core_context}\n\n\
             CONVERSATION TO ANALYZE:\n{working_memory}\n\n\
             Extract 3 to 5 facts that are:\n\
             1. Factual statements (not opinions or questions)\n\
             2. Relevant to the core topic\n\
             3. Worth remembering for future conversations\n\
             4. Specific and actionable\n\n\
             Return a JSON array of objects with this structure:\n\
             {{\"content\": \"The factual statement\", \"confidence\": 0.6, \
             \"source\": \"LLM_INFERRED\", \
             \"supportingEvidence\": [\"Quote or context that supports this fact\"]}}\n\n\
             JSON array:"
        );

        let request = CompletionRequest::new(
            prompt,
            "You are a fact extraction system. Return only valid JSON.",
            model,
        );

        let response = match self.provider.complete(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Fact extraction call failed, skipping candidates");
                return Vec::new();
            }
        };

        let payload = strip_code_fences(&response.content);
        let raw: Vec<RawCandidate> = match serde_json::from_str(payload) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Fact extraction returned unparseable JSON, skipping candidates");
                return Vec::new();
            }
        };

        raw.into_iter()
            .filter(|c| !c.content.trim().is_empty())
            .map(Candidate::from)
            .collect()
    }

    async fn embed_or_none(&self, text: &str) -> Option<Vec<f32>> {
        match self.provider.embed(text).await {
            Ok(embedding) => Some(embedding),
            Err(e) => {
                warn!(error = %e, "Embedding call failed");
                None
            }
        }
    }
}

/// A candidate fact as decoded from the extraction response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCandidate {
    content: String,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    supporting_evidence: Vec<String>,
}

/// A normalized candidate: unknown sources default to LlmInferred, and a
/// missing confidence falls back to the source's base weight.
#[derive(Debug)]
struct Candidate {
    content: String,
    confidence: f64,
    source: FactSource,
    supporting_evidence: Vec<String>,
}

impl From<RawCandidate> for Candidate {
    fn from(raw: RawCandidate) -> Self {
        let source = match raw.source.as_deref() {
            Some("USER_STATED") => FactSource::UserStated,
            Some("USER_CONFIRMED") => FactSource::UserConfirmed,
            Some("IMPLICIT") => FactSource::Implicit,
            _ => FactSource::LlmInferred,
        };
        let confidence = raw
            .confidence
            .unwrap_or_else(|| source.base_weight())
            .clamp(0.0, 1.0);
        Self {
            content: raw.content,
            confidence,
            source,
            supporting_evidence: raw.supporting_evidence,
        }
    }
}
