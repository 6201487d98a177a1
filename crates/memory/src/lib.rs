//! Memory system for Colloquy.
//!
//! Two cooperating pieces:
//! - [`manager::MemoryManager`] owns the three-tier representation
//!   (core context / working memory / key facts) and decides when to
//!   compress.
//! - [`facts::FactStore`] owns the long-term fact set: extraction,
//!   similarity merge, confidence events, temporal decay, and pruning.

pub mod facts;
pub mod manager;
pub mod similarity;

pub use facts::{ConfidenceEvent, FactStore};
pub use manager::MemoryManager;
pub use similarity::cosine_similarity;
