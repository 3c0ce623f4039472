//! Deletion cycle
//!
//! One cycle deletes the conversation currently at the top of the inbox:
//! open it, open its info panel, pick the delete entry, confirm. Each step is
//! gated on the previous one, and a failed step always runs its recovery so
//! the next cycle starts from the list again.

pub mod errors;
pub mod executor;
pub mod strategies;
pub mod types;

pub use errors::CycleFailure;
pub use executor::{DefaultDeletionCycle, DeletionCycle};
pub use strategies::{recovery_for, DefaultRecoveryHandler, RecoveryHandler};
pub use types::{CycleConfig, CycleOutcome, CycleStep, Recovery};
