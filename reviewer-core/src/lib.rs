//! Core rules for reviewer assignment: the domain model, the typed errors,
//! reviewer selection, and pull request state transitions.
//!
//! Nothing in this crate performs I/O. Randomness and the current time are
//! always passed in by the caller.

pub mod assignment;
pub mod error;
pub mod lifecycle;
pub mod model;

pub use assignment::{
    select_initial_reviewers, select_replacement_reviewer, NoCandidate, ReviewerAssigner,
    DEFAULT_MAX_REVIEWERS,
};
pub use error::{DomainError, ErrorCode, Resource};
pub use lifecycle::MergeOutcome;
pub use model::*;
