//! # Colloquy Core
//!
//! Domain types, traits, and error definitions for the Colloquy
//! conversation-memory pipeline. This crate has **zero framework
//! dependencies** — it defines the domain model that all other crates
//! implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is defined as a trait here: the completion/
//! embedding provider, the persistent store, and the message transport.
//! Implementations live in their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod json;
pub mod message;
pub mod node;
pub mod provider;
pub mod store;
pub mod transport;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, Result, StoreError, TransportError};
pub use message::{AdjudicationResult, Message, MessageStatus, QueueMessage};
pub use node::{FactSource, KeyFact, Node, NodeMemory};
pub use provider::{CompletionRequest, CompletionResponse, Provider, Usage};
pub use store::NodeStore;
pub use transport::Transport;
