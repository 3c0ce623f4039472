//! Action Executor for dmsweep
//!
//! Every action here is best effort: one UI mutation followed by a bounded wait.
//! - three primitives: click, navigate (including history back), escape
//! - settle waits drawn from the active speed profile or fixed
//! - [`await_condition`], the bounded poll used for follow-on elements

pub mod errors;
mod primitives;
pub mod types;
mod waiting;

pub use errors::*;
pub use primitives::*;
pub use types::*;
pub use waiting::*;
