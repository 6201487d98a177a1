//! Adjudication and pipeline orchestration for Colloquy.
//!
//! - [`adjudicator::Adjudicator`] judges one message against a node's
//!   memory and never fails: ambiguity resolves to a conservative
//!   rejecting verdict.
//! - [`controller::PipelineController`] is the consumer loop: dequeue,
//!   adjudicate, persist the terminal status, and fold accepted messages
//!   into node memory.

pub mod adjudicator;
pub mod controller;

pub use adjudicator::Adjudicator;
pub use controller::PipelineController;
