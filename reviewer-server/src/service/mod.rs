//! Application services.
//!
//! Services sit between the HTTP handlers and the repositories. They look up
//! the state they need, apply the pure rules from `reviewer_core`, and write
//! the result back. Failures come back as [`ServiceError`].

mod pull_request;
mod team;
mod user;

pub use pull_request::{PullRequestService, PullRequestStats, Reassignment};
pub use team::TeamService;
pub use user::UserService;

use thiserror::Error;

use reviewer_core::DomainError;

use crate::repository::RepositoryError;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// A typed lifecycle failure that the caller can act on.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Another writer changed the pull request first. Safe to retry.
    #[error("concurrent update: {0}")]
    Conflict(String),

    /// Stored data references something that does not exist.
    #[error("integrity error: {0}")]
    Integrity(String),

    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for ServiceError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict { what } => Self::Conflict(what),
            other => Self::Repository(other),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
