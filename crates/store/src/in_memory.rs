//! In-memory store — useful for testing and single-process deployments.
//!
//! One mutation path for node versions: `update_node` checks the expected
//! version under the write lock and bumps it by exactly one. There is no
//! other way to change `Node.version`. Inserts are create-only — a
//! duplicate id is a `Storage` error, never a silent overwrite.

use async_trait::async_trait;
use chrono::Utc;
use colloquy_core::error::StoreError;
use colloquy_core::message::{Message, MessageStatus};
use colloquy_core::node::{Node, NodeMemory};
use colloquy_core::store::NodeStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// An in-memory store keyed by node/message id.
pub struct InMemoryStore {
    nodes: Arc<RwLock<HashMap<String, Node>>>,
    messages: Arc<RwLock<HashMap<String, Message>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            nodes: Arc::new(RwLock::new(HashMap::new())),
            messages: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn insert_node(&self, node: Node) -> Result<(), StoreError> {
        let mut nodes = self.nodes.write().await;
        if nodes.contains_key(&node.id) {
            return Err(StoreError::Storage(format!(
                "node {} already exists",
                node.id
            )));
        }
        debug!(node_id = %node.id, topic = %node.topic, "Inserting node");
        nodes.insert(node.id.clone(), node);
        Ok(())
    }

    async fn get_node(&self, id: &str) -> Result<Node, StoreError> {
        self.nodes
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::node_not_found(id))
    }

    async fn update_node(
        &self,
        id: &str,
        memory: NodeMemory,
        expected_version: u64,
    ) -> Result<Node, StoreError> {
        let mut nodes = self.nodes.write().await;
        let node = nodes
            .get_mut(id)
            .ok_or_else(|| StoreError::node_not_found(id))?;

        if node.version != expected_version {
            return Err(StoreError::VersionConflict {
                node_id: id.to_string(),
                expected: expected_version,
                actual: node.version,
            });
        }

        node.memory = memory;
        node.version += 1;
        node.updated_at = Utc::now();
        debug!(node_id = %id, version = node.version, "Updated node memory");
        Ok(node.clone())
    }

    async fn list_nodes(&self) -> Result<Vec<Node>, StoreError> {
        let nodes = self.nodes.read().await;
        let mut all: Vec<Node> = nodes.values().cloned().collect();
        all.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(all)
    }

    async fn insert_message(&self, message: Message) -> Result<(), StoreError> {
        let mut messages = self.messages.write().await;
        if messages.contains_key(&message.id) {
            return Err(StoreError::Storage(format!(
                "message {} already exists",
                message.id
            )));
        }
        messages.insert(message.id.clone(), message);
        Ok(())
    }

    async fn get_message(&self, id: &str) -> Result<Message, StoreError> {
        self.messages
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::message_not_found(id))
    }

    async fn update_message_status(
        &self,
        id: &str,
        status: MessageStatus,
    ) -> Result<Message, StoreError> {
        let mut messages = self.messages.write().await;
        let message = messages
            .get_mut(id)
            .ok_or_else(|| StoreError::message_not_found(id))?;

        if message.status.is_terminal() {
            return Err(StoreError::Storage(format!(
                "message {id} is already terminal ({})",
                message.status
            )));
        }

        message.status = status;
        debug!(message_id = %id, status = %status, "Updated message status");
        Ok(message.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colloquy_core::node::NodeMemory;

    fn test_memory() -> NodeMemory {
        NodeMemory {
            core_context: "Topic: test".into(),
            working_memory: String::new(),
            key_facts: vec![],
            message_count: 0,
            last_summary_at: 0,
        }
    }

    fn test_node() -> Node {
        Node::new("test", None, "mock-model", test_memory())
    }

    fn test_message(node_id: &str) -> Message {
        Message {
            id: uuid::Uuid::new_v4().to_string(),
            content: "hello".into(),
            user_id: "u1".into(),
            node_id: node_id.into(),
            target_node_version: 1,
            status: MessageStatus::Pending,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn insert_and_get_node() {
        let store = InMemoryStore::new();
        let node = test_node();
        let id = node.id.clone();
        store.insert_node(node).await.unwrap();

        let fetched = store.get_node(&id).await.unwrap();
        assert_eq!(fetched.id, id);
        assert_eq!(fetched.version, 1);
    }

    #[tokio::test]
    async fn duplicate_node_insert_is_rejected() {
        let store = InMemoryStore::new();
        let node = test_node();
        let id = node.id.clone();
        store.insert_node(node.clone()).await.unwrap();

        // Bump the stored copy, then try to re-insert the original
        store.update_node(&id, test_memory(), 1).await.unwrap();
        let err = store.insert_node(node).await.unwrap_err();
        assert!(matches!(err, StoreError::Storage(_)));

        // The stored record is untouched; only update_node moves versions
        assert_eq!(store.get_node(&id).await.unwrap().version, 2);
    }

    #[tokio::test]
    async fn duplicate_message_insert_is_rejected() {
        let store = InMemoryStore::new();
        let message = test_message("n1");
        let id = message.id.clone();
        store.insert_message(message.clone()).await.unwrap();
        store
            .update_message_status(&id, MessageStatus::Accepted)
            .await
            .unwrap();

        // Re-inserting cannot resurrect a pre-terminal copy
        let err = store.insert_message(message).await.unwrap_err();
        assert!(matches!(err, StoreError::Storage(_)));
        assert_eq!(
            store.get_message(&id).await.unwrap().status,
            MessageStatus::Accepted
        );
    }

    #[tokio::test]
    async fn missing_node_is_not_found() {
        let store = InMemoryStore::new();
        let err = store.get_node("missing").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { kind: "node", .. }));
    }

    #[tokio::test]
    async fn update_node_bumps_version_once() {
        let store = InMemoryStore::new();
        let node = test_node();
        let id = node.id.clone();
        store.insert_node(node).await.unwrap();

        let mut memory = test_memory();
        memory.message_count = 1;
        let updated = store.update_node(&id, memory, 1).await.unwrap();
        assert_eq!(updated.version, 2);
        assert_eq!(updated.memory.message_count, 1);

        // The stored copy matches
        assert_eq!(store.get_node(&id).await.unwrap().version, 2);
    }

    #[tokio::test]
    async fn stale_expected_version_conflicts() {
        let store = InMemoryStore::new();
        let node = test_node();
        let id = node.id.clone();
        store.insert_node(node).await.unwrap();

        store.update_node(&id, test_memory(), 1).await.unwrap();

        let err = store.update_node(&id, test_memory(), 1).await.unwrap_err();
        match err {
            StoreError::VersionConflict {
                expected, actual, ..
            } => {
                assert_eq!(expected, 1);
                assert_eq!(actual, 2);
            }
            other => panic!("expected VersionConflict, got {other:?}"),
        }
        // The write did not happen
        assert_eq!(store.get_node(&id).await.unwrap().version, 2);
    }

    #[tokio::test]
    async fn message_status_transitions_once() {
        let store = InMemoryStore::new();
        let message = test_message("n1");
        let id = message.id.clone();
        store.insert_message(message).await.unwrap();

        let accepted = store
            .update_message_status(&id, MessageStatus::Accepted)
            .await
            .unwrap();
        assert_eq!(accepted.status, MessageStatus::Accepted);

        // Terminal states never transition again
        let err = store
            .update_message_status(&id, MessageStatus::Rejected)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Storage(_)));
        assert_eq!(
            store.get_message(&id).await.unwrap().status,
            MessageStatus::Accepted
        );
    }

    #[tokio::test]
    async fn list_nodes_most_recent_first() {
        let store = InMemoryStore::new();
        let first = test_node();
        let second = test_node();
        let second_id = second.id.clone();
        store.insert_node(first).await.unwrap();
        store.insert_node(second).await.unwrap();

        // Touch the second node so it sorts first
        store.update_node(&second_id, test_memory(), 1).await.unwrap();

        let all = store.list_nodes().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, second_id);
    }
}
