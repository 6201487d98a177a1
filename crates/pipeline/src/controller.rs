//! Pipeline controller — the consumer loop.
//!
//! Drives one envelope at a time through fetch → adjudicate → persist
//! status → (iff accepted) fold into node memory. Failures are isolated
//! per envelope: the loop logs and moves on, it never terminates because
//! of a single message. Per-node ordering is the transport's guarantee,
//! not re-checked here.

use crate::adjudicator::Adjudicator;
use chrono::Utc;
use colloquy_config::{AppConfig, PipelineConfig};
use colloquy_core::error::{Error, StoreError, TransportError};
use colloquy_core::message::{Message, MessageStatus, QueueMessage};
use colloquy_core::node::Node;
use colloquy_core::provider::{CompletionRequest, Provider};
use colloquy_core::store::NodeStore;
use colloquy_core::transport::Transport;
use colloquy_memory::MemoryManager;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub struct PipelineController {
    store: Arc<dyn NodeStore>,
    transport: Arc<dyn Transport>,
    provider: Arc<dyn Provider>,
    adjudicator: Adjudicator,
    memory: MemoryManager,
    pipeline: PipelineConfig,
    default_model: String,
}

impl PipelineController {
    pub fn new(
        store: Arc<dyn NodeStore>,
        transport: Arc<dyn Transport>,
        provider: Arc<dyn Provider>,
        config: &AppConfig,
    ) -> Self {
        let adjudicator = Adjudicator::new(provider.clone(), config.adjudication.clone());
        let memory = MemoryManager::new(provider.clone(), config.memory.clone());
        Self {
            store,
            transport,
            provider,
            adjudicator,
            memory,
            pipeline: config.pipeline.clone(),
            default_model: config.default_model.clone(),
        }
    }

    /// Create a node with freshly seeded memory and persist it at version 1.
    pub async fn create_node(&self, topic: &str, description: Option<&str>) -> Result<Node, Error> {
        let memory = self.memory.initialize_memory(topic, description);
        let node = Node::new(
            topic,
            description.map(String::from),
            &self.default_model,
            memory,
        );
        self.store.insert_node(node.clone()).await?;
        info!(node_id = %node.id, topic = %node.topic, "Created node");
        Ok(node)
    }

    /// Record a pending message against a node and enqueue its envelope.
    ///
    /// `target_node_version` is stamped from the node version visible at
    /// submission time; the adjudicator sees both it and the version
    /// current at processing time.
    pub async fn submit(
        &self,
        node_id: &str,
        user_id: &str,
        content: &str,
    ) -> Result<Message, Error> {
        let node = self.store.get_node(node_id).await?;
        let message = Message {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            user_id: user_id.into(),
            node_id: node.id.clone(),
            target_node_version: node.version,
            status: MessageStatus::Pending,
            created_at: Utc::now(),
        };
        self.store.insert_message(message.clone()).await?;
        self.transport
            .enqueue(QueueMessage::from_message(&message))
            .await?;
        debug!(message_id = %message.id, node_id = %node.id, "Submitted message");
        Ok(message)
    }

    /// Run the consumer loop until the transport closes.
    pub async fn run(&self) {
        info!(
            transport = self.transport.name(),
            store = self.store.name(),
            "Pipeline consumer started"
        );
        let wait = Duration::from_secs(self.pipeline.poll_wait_secs);

        loop {
            match self.transport.recv(wait).await {
                Ok(Some(envelope)) => {
                    let message_id = envelope.message_id.clone();
                    if let Err(e) = self.process_envelope(envelope).await {
                        error!(
                            message_id = %message_id,
                            error = %e,
                            "Envelope processing failed, dropping"
                        );
                    }
                }
                Ok(None) => continue,
                Err(TransportError::Closed) => {
                    info!("Transport closed, stopping consumer");
                    break;
                }
                Err(e) => {
                    error!(error = %e, "Transport receive failed");
                }
            }
        }
    }

    /// Drive one envelope to a terminal message status.
    ///
    /// Returns `Ok(None)` when the envelope was discarded without a
    /// transition (unknown or already-terminal message).
    pub async fn process_envelope(
        &self,
        envelope: QueueMessage,
    ) -> Result<Option<MessageStatus>, Error> {
        let message = match self.store.get_message(&envelope.message_id).await {
            Ok(message) => message,
            Err(StoreError::NotFound { .. }) => {
                warn!(
                    message_id = %envelope.message_id,
                    "Envelope references unknown message, discarding"
                );
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        if message.status.is_terminal() {
            debug!(
                message_id = %message.id,
                status = %message.status,
                "Message already adjudicated, discarding"
            );
            return Ok(None);
        }

        let node = self.store.get_node(&message.node_id).await?;
        let verdict = self.adjudicator.adjudicate(&message, &node).await;
        let status = verdict.terminal_status();
        info!(
            message_id = %message.id,
            node_id = %node.id,
            status = %status,
            score = verdict.score,
            reason = %verdict.reason,
            "Adjudication verdict"
        );

        self.store.update_message_status(&message.id, status).await?;

        if status == MessageStatus::Accepted {
            self.fold_accepted(&message, node).await?;
        }

        Ok(Some(status))
    }

    /// Fold an accepted message (and optionally a generated reply) into
    /// node memory, compress when due, and persist at `version + 1`.
    ///
    /// A `VersionConflict` from the store propagates out of here — it is
    /// never resolved by overwriting; the caller logs it and the envelope
    /// is left to transport redelivery semantics.
    async fn fold_accepted(&self, message: &Message, node: Node) -> Result<(), Error> {
        let reply = if self.pipeline.generate_replies {
            self.generate_reply(&node, &message.content).await
        } else {
            None
        };

        let mut memory = node.memory.clone();
        let compress = self
            .memory
            .add_message(&mut memory, &message.content, reply.as_deref());
        if compress {
            self.memory.compress_memory(&mut memory, &node.model).await;
        }

        let updated = self.store.update_node(&node.id, memory, node.version).await?;
        info!(
            node_id = %updated.id,
            version = updated.version,
            message_count = updated.memory.message_count,
            "Folded accepted message into node memory"
        );
        Ok(())
    }

    /// Ask the provider for an assistant reply against the assembled
    /// context. Failure degrades to folding the user message alone.
    async fn generate_reply(&self, node: &Node, content: &str) -> Option<String> {
        let context = self
            .memory
            .get_context(&node.memory, std::slice::from_ref(&content.to_string()));
        let prompt = format!(
            "{context}\n\nRespond to the latest message. Be concise and stay \
             on the conversation's topic."
        );
        let request = CompletionRequest::new(
            prompt,
            "You are the assistant in a topic-scoped conversation.",
            &node.model,
        );

        match self.provider.complete(request).await {
            Ok(response) => {
                if let Some(usage) = &response.usage {
                    debug!(
                        node_id = %node.id,
                        total_tokens = usage.total_tokens,
                        "Reply token usage"
                    );
                }
                Some(response.content.trim().to_string())
            }
            Err(e) => {
                warn!(node_id = %node.id, error = %e, "Reply generation failed, folding without reply");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use colloquy_core::error::ProviderError;
    use colloquy_core::provider::CompletionResponse;
    use colloquy_store::InMemoryStore;
    use colloquy_transport::InMemoryQueue;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    const ACCEPT: &str =
        r#"{"isRelevant": true, "isStale": false, "reason": "new info", "score": 0.9}"#;
    const REJECT: &str =
        r#"{"isRelevant": false, "isStale": false, "reason": "off topic", "score": 0.8}"#;
    const STALE: &str =
        r#"{"isRelevant": true, "isStale": true, "reason": "already known", "score": 0.7}"#;

    /// Scripted provider: completions consumed in call order.
    struct ScriptedProvider {
        responses: Mutex<VecDeque<Result<String, ProviderError>>>,
    }

    impl ScriptedProvider {
        fn new(responses: Vec<Result<String, ProviderError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().collect()),
            }
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, ProviderError> {
            let next = self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ProviderError::Network("script exhausted".into())));
            next.map(|content| CompletionResponse {
                content,
                usage: None,
            })
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
            Ok(vec![1.0, 0.0, 0.0])
        }
    }

    fn controller(
        responses: Vec<Result<String, ProviderError>>,
        config: AppConfig,
    ) -> PipelineController {
        PipelineController::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(InMemoryQueue::new()),
            Arc::new(ScriptedProvider::new(responses)),
            &config,
        )
    }

    fn no_reply_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.pipeline.generate_replies = false;
        config
    }

    async fn bootstrap(c: &PipelineController) -> (Node, QueueMessage) {
        let node = c
            .create_node("Rollout Plan", Some("Ship v2 by Friday"))
            .await
            .unwrap();
        let message = c.submit(&node.id, "u1", "QA signed off").await.unwrap();
        (node, QueueMessage::from_message(&message))
    }

    #[tokio::test]
    async fn created_node_carries_seeded_memory() {
        let c = controller(vec![], no_reply_config());
        let node = c
            .create_node("Rollout Plan", Some("Ship v2 by Friday"))
            .await
            .unwrap();

        assert_eq!(node.version, 1);
        assert_eq!(
            node.memory.core_context,
            "Topic: Rollout Plan\nInitial Context: Ship v2 by Friday"
        );
        assert_eq!(node.memory.key_facts.len(), 1);
        assert_eq!(node.memory.key_facts[0].confidence, 0.9);
        // Persisted, not just returned
        let fetched = c.store.get_node(&node.id).await.unwrap();
        assert_eq!(fetched.version, 1);
    }

    #[tokio::test]
    async fn accepted_message_folds_and_bumps_version_once() {
        let c = controller(vec![Ok(ACCEPT.into())], no_reply_config());
        let (node, envelope) = bootstrap(&c).await;
        let message_id = envelope.message_id.clone();

        let status = c.process_envelope(envelope).await.unwrap();
        assert_eq!(status, Some(MessageStatus::Accepted));

        let updated = c.store.get_node(&node.id).await.unwrap();
        assert_eq!(updated.version, 2);
        assert!(updated.memory.working_memory.contains("User: QA signed off"));
        assert_eq!(updated.memory.message_count, 1);

        let message = c.store.get_message(&message_id).await.unwrap();
        assert_eq!(message.status, MessageStatus::Accepted);
    }

    #[tokio::test]
    async fn rejected_message_leaves_node_untouched() {
        let c = controller(vec![Ok(REJECT.into())], no_reply_config());
        let (node, envelope) = bootstrap(&c).await;
        let message_id = envelope.message_id.clone();

        let status = c.process_envelope(envelope).await.unwrap();
        assert_eq!(status, Some(MessageStatus::Rejected));

        let after = c.store.get_node(&node.id).await.unwrap();
        assert_eq!(after.version, 1);
        assert!(after.memory.working_memory.is_empty());
        assert_eq!(
            c.store.get_message(&message_id).await.unwrap().status,
            MessageStatus::Rejected
        );
    }

    #[tokio::test]
    async fn stale_overrides_relevant() {
        let c = controller(vec![Ok(STALE.into())], no_reply_config());
        let (node, envelope) = bootstrap(&c).await;

        let status = c.process_envelope(envelope).await.unwrap();
        assert_eq!(status, Some(MessageStatus::Stale));
        assert_eq!(c.store.get_node(&node.id).await.unwrap().version, 1);
    }

    #[tokio::test]
    async fn provider_failure_resolves_to_stale_not_crash() {
        let c = controller(
            vec![Err(ProviderError::Network("connection refused".into()))],
            no_reply_config(),
        );
        let (node, envelope) = bootstrap(&c).await;

        // The fallback verdict rejects: no fold, no version bump
        let status = c.process_envelope(envelope).await.unwrap();
        assert_eq!(status, Some(MessageStatus::Stale));
        assert_eq!(c.store.get_node(&node.id).await.unwrap().version, 1);
    }

    #[tokio::test]
    async fn unknown_message_is_discarded() {
        let c = controller(vec![], no_reply_config());
        let envelope = QueueMessage {
            message_id: "ghost".into(),
            node_id: "n1".into(),
            target_node_version: 1,
            content: "hello".into(),
            user_id: "u1".into(),
            timestamp: None,
        };
        let status = c.process_envelope(envelope).await.unwrap();
        assert_eq!(status, None);
    }

    #[tokio::test]
    async fn terminal_message_is_not_reprocessed() {
        // One ACCEPT script entry; a second adjudication would exhaust it
        let c = controller(vec![Ok(ACCEPT.into())], no_reply_config());
        let (node, envelope) = bootstrap(&c).await;

        c.process_envelope(envelope.clone()).await.unwrap();
        let status = c.process_envelope(envelope).await.unwrap();
        assert_eq!(status, None);
        // Still exactly one fold
        assert_eq!(c.store.get_node(&node.id).await.unwrap().version, 2);
    }

    #[tokio::test]
    async fn reply_is_folded_alongside_user_turn() {
        let config = AppConfig::default();
        // Call order: adjudication, then reply generation
        let c = controller(
            vec![Ok(ACCEPT.into()), Ok("Noted, shipping Friday.".into())],
            config,
        );
        let (node, envelope) = bootstrap(&c).await;

        c.process_envelope(envelope).await.unwrap();
        let updated = c.store.get_node(&node.id).await.unwrap();
        assert!(updated
            .memory
            .working_memory
            .contains("User: QA signed off\nAssistant: Noted, shipping Friday."));
    }

    #[tokio::test]
    async fn reply_failure_degrades_to_user_turn_only() {
        let c = controller(
            vec![
                Ok(ACCEPT.into()),
                Err(ProviderError::Timeout("deadline exceeded".into())),
            ],
            AppConfig::default(),
        );
        let (node, envelope) = bootstrap(&c).await;

        c.process_envelope(envelope).await.unwrap();
        let updated = c.store.get_node(&node.id).await.unwrap();
        assert_eq!(updated.version, 2);
        assert_eq!(updated.memory.working_memory, "User: QA signed off");
    }

    #[tokio::test]
    async fn fold_compresses_when_turn_threshold_reached() {
        let mut config = no_reply_config();
        config.memory.working_memory_limit = 1;
        // Adjudication, then extraction, then summary
        let c = controller(
            vec![
                Ok(ACCEPT.into()),
                Ok("[]".into()),
                Ok("Summary: QA done.".into()),
            ],
            config,
        );
        let (node, envelope) = bootstrap(&c).await;

        c.process_envelope(envelope).await.unwrap();
        let updated = c.store.get_node(&node.id).await.unwrap();
        assert_eq!(updated.memory.working_memory, "Summary: QA done.");
        assert_eq!(updated.memory.last_summary_at, 1);
        assert_eq!(updated.version, 2);
    }

    #[tokio::test]
    async fn submit_stamps_current_node_version() {
        let c = controller(vec![Ok(ACCEPT.into())], no_reply_config());
        let (node, envelope) = bootstrap(&c).await;
        assert_eq!(envelope.target_node_version, 1);

        c.process_envelope(envelope).await.unwrap();
        // A second submission sees the post-fold version
        let second = c.submit(&node.id, "u1", "follow-up").await.unwrap();
        assert_eq!(second.target_node_version, 2);
    }
}
