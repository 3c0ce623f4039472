//! Element Locator - label-driven element resolution
//!
//! This crate finds the handful of controls the deletion cycle needs:
//! - the top conversation row of the inbox list
//! - the info control, through accessible labels with two positional fallbacks
//! - the delete and confirm controls, by exact text against the label table
//!
//! In-page probes only report candidates; choosing between them happens in
//! [`strategies`] so it can be exercised without a browser.

pub mod errors;
pub mod labels;
pub mod probe;
pub mod resolver;
pub mod strategies;
pub mod types;

pub use errors::*;
pub use labels::*;
pub use resolver::*;
pub use strategies::*;
pub use types::*;
