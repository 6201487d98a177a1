//! Transport trait — at-least-once delivery of queue envelopes.
//!
//! The transport owns the per-node ordering guarantee: envelopes for one
//! node are delivered in order (partition key = node id), and redelivery of
//! the same message id must not double-process (dedup key = message id).
//! The pipeline assumes those guarantees rather than re-implementing them.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::TransportError;
use crate::message::QueueMessage;

/// Delivery channel for queue envelopes.
#[async_trait]
pub trait Transport: Send + Sync {
    /// The transport name (e.g. "in_memory", "sqs").
    fn name(&self) -> &str;

    /// Enqueue an envelope. `node_id` is the ordering key, `message_id`
    /// the deduplication key.
    async fn enqueue(&self, message: QueueMessage) -> std::result::Result<(), TransportError>;

    /// Receive the next envelope, waiting up to `wait` (long poll).
    /// Returns `None` on timeout with an empty queue.
    async fn recv(
        &self,
        wait: Duration,
    ) -> std::result::Result<Option<QueueMessage>, TransportError>;
}
