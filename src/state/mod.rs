//! State module for tracking harvest progress
//!
//! # Components
//!
//! - `HarvestPhase`: the lifecycle of one harvest call (probing, dispatching, collecting, terminal)
//! - `HarvestStatus`: the terminal subset of phases reported back to the caller
//! - `FailureKind`: the classification of a failed page fetch

mod failure;
mod phase;

// Re-export main types
pub use failure::{FailureKind, RetryCause};
pub use phase::{HarvestPhase, HarvestStatus};
