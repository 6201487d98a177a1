//! NodeStore trait — the repository over node and message records.
//!
//! The persistence layer itself is an external collaborator; this trait is
//! the key-value read/update surface the pipeline needs. Updates are atomic
//! per record, and `update_node` is the only path that increments a node's
//! version.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::message::{Message, MessageStatus};
use crate::node::{Node, NodeMemory};

/// Repository over Node and Message records with optimistic versioning.
#[async_trait]
pub trait NodeStore: Send + Sync {
    /// The backend name (e.g. "in_memory", "postgres").
    fn name(&self) -> &str;

    /// Insert a freshly created node.
    async fn insert_node(&self, node: Node) -> std::result::Result<(), StoreError>;

    /// Fetch a node by id.
    async fn get_node(&self, id: &str) -> std::result::Result<Node, StoreError>;

    /// Replace a node's memory and bump its version by exactly one.
    ///
    /// `expected_version` is the version the caller read; a mismatch is a
    /// `VersionConflict` and the write does not happen. Returns the updated
    /// node.
    async fn update_node(
        &self,
        id: &str,
        memory: NodeMemory,
        expected_version: u64,
    ) -> std::result::Result<Node, StoreError>;

    /// List all nodes, most recently updated first.
    async fn list_nodes(&self) -> std::result::Result<Vec<Node>, StoreError>;

    /// Insert a message record.
    async fn insert_message(&self, message: Message) -> std::result::Result<(), StoreError>;

    /// Fetch a message by id.
    async fn get_message(&self, id: &str) -> std::result::Result<Message, StoreError>;

    /// Transition a message's status. Terminal states never transition
    /// again; the store rejects such writes.
    async fn update_message_status(
        &self,
        id: &str,
        status: MessageStatus,
    ) -> std::result::Result<Message, StoreError>;
}
