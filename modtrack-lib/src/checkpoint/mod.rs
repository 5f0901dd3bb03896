//! Resumable progress for long-running operations.
//!
//! An operation moves from having no checkpoint, through periodic saves while it runs,
//! to either completion (checkpoint finalized) or abandonment (checkpoint left for a
//! later run to resume). There is no explicit abandon step: a process that stops
//! without finalizing simply leaves its last checkpoint behind.

mod checkpointer;
mod record;
mod store;
mod strategy;

pub use checkpointer::Checkpointer;
pub use record::{CHECKPOINT_VERSION, Checkpoint, CheckpointMetadata};
pub use store::CheckpointStore;
pub use strategy::{Combinator, SaveContext, SaveDecision, SaveStrategy};
