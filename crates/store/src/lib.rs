//! NodeStore implementations for Colloquy.

pub mod in_memory;

pub use in_memory::InMemoryStore;
