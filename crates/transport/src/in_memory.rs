//! In-memory queue — per-node FIFO partitions with message-id dedup.
//!
//! Mirrors the delivery contract the pipeline relies on from a real queue
//! (SQS FIFO with group id = node id, dedup id = message id):
//! - envelopes for one node are received in enqueue order
//! - re-enqueueing an already-seen message id is a no-op
//! - `recv` long-polls up to the caller's wait duration
//!
//! Deduplication covers a bounded window of the most recent
//! [`DEDUP_WINDOW`] message ids, the same shape as a real queue's dedup
//! interval: once an id ages out of the window it may be enqueued again.
//!
//! Partitions are drained round-robin so one busy node cannot starve the
//! others.

use async_trait::async_trait;
use colloquy_core::error::TransportError;
use colloquy_core::message::QueueMessage;
use colloquy_core::transport::Transport;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tracing::debug;

/// How many recent message ids the dedup window retains.
const DEDUP_WINDOW: usize = 1024;

#[derive(Default)]
struct QueueState {
    /// node id → FIFO of pending envelopes
    partitions: HashMap<String, VecDeque<QueueMessage>>,
    /// Round-robin order of node ids with pending envelopes
    ready: VecDeque<String>,
    /// Recently enqueued message ids, for deduplication
    seen: HashSet<String>,
    /// Insertion order of `seen`, oldest first, for window eviction
    seen_order: VecDeque<String>,
}

/// An in-memory transport for testing and single-process deployments.
pub struct InMemoryQueue {
    state: Arc<Mutex<QueueState>>,
    notify: Arc<Notify>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState::default())),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Number of envelopes currently pending across all partitions.
    pub async fn len(&self) -> usize {
        let state = self.state.lock().await;
        state.partitions.values().map(|p| p.len()).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for InMemoryQueue {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn enqueue(&self, message: QueueMessage) -> Result<(), TransportError> {
        let mut state = self.state.lock().await;

        if !state.seen.insert(message.message_id.clone()) {
            debug!(message_id = %message.message_id, "Duplicate envelope, dropping");
            return Ok(());
        }
        state.seen_order.push_back(message.message_id.clone());
        while state.seen_order.len() > DEDUP_WINDOW {
            if let Some(evicted) = state.seen_order.pop_front() {
                state.seen.remove(&evicted);
            }
        }

        let partition = state
            .partitions
            .entry(message.node_id.clone())
            .or_default();
        let was_empty = partition.is_empty();
        debug!(message_id = %message.message_id, node_id = %message.node_id, "Enqueued envelope");
        partition.push_back(message.clone());
        if was_empty {
            state.ready.push_back(message.node_id);
        }

        drop(state);
        self.notify.notify_one();
        Ok(())
    }

    async fn recv(&self, wait: Duration) -> Result<Option<QueueMessage>, TransportError> {
        let deadline = tokio::time::Instant::now() + wait;

        loop {
            {
                let mut state = self.state.lock().await;
                if let Some(node_id) = state.ready.pop_front() {
                    // Ready entries always point at a non-empty partition
                    if let Some(message) = state
                        .partitions
                        .get_mut(&node_id)
                        .and_then(|partition| partition.pop_front())
                    {
                        let drained = state
                            .partitions
                            .get(&node_id)
                            .map_or(true, |partition| partition.is_empty());
                        if !drained {
                            state.ready.push_back(node_id);
                        }
                        return Ok(Some(message));
                    }
                }
            }

            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            // Woken either by an enqueue or by the poll deadline.
            let _ = tokio::time::timeout_at(deadline, self.notify.notified()).await;
        }
    }
}
