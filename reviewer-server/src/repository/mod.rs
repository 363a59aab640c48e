//! Repository abstraction for teams, users, and pull requests.
//!
//! The services talk to storage only through the two traits defined here,
//! so the same lifecycle code runs against the in-memory backend in tests and
//! the SQLite backend in production.
//!
//! # Atomicity
//!
//! Every method is a single unit of work. Multi-row writes
//! (`PullRequestRepository::create`, `PullRequestRepository::swap_reviewer`,
//! `UserTeamRepository::upsert_team`) are all-or-nothing: a reader never sees
//! a pull request without its reviewers or half of a swap.
//!
//! # Compare-and-swap
//!
//! Mutating pull request methods re-check their precondition inside the
//! write and return [`RepositoryError::Conflict`] if it no longer holds. This
//! backs up the per-PR locks in the service layer when several processes
//! share one database.

mod memory;
mod sqlite;

pub use memory::InMemoryRepository;
pub use sqlite::SqliteRepository;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use reviewer_core::{PullRequest, PullRequestId, Team, TeamName, User, UserId};

/// Errors from a storage backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    /// The backend failed to carry out an operation.
    #[error("storage error during {operation}: {message}")]
    Storage {
        operation: &'static str,
        message: String,
    },

    /// Stored data could not be decoded.
    #[error("corrupt {what} in storage")]
    Corruption { what: String },

    /// A write's precondition did not hold when it was applied.
    #[error("conflicting write: {what}")]
    Conflict { what: String },
}

impl RepositoryError {
    pub fn storage(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Storage {
            operation,
            message: message.into(),
        }
    }

    pub fn corruption(what: impl Into<String>) -> Self {
        Self::Corruption { what: what.into() }
    }

    pub fn conflict(what: impl Into<String>) -> Self {
        Self::Conflict { what: what.into() }
    }
}

/// Storage for teams and their members.
#[async_trait]
pub trait UserTeamRepository: Send + Sync {
    /// Get a user by id, returning None if not found.
    async fn get_user(&self, id: &UserId) -> Result<Option<User>, RepositoryError>;

    /// Get a team and all of its members, returning None if the team does not exist.
    async fn get_team(&self, name: &TeamName) -> Result<Option<Team>, RepositoryError>;

    /// Create the team if needed and add members whose ids are not yet known.
    ///
    /// Users that already exist (in this or any other team) are left untouched.
    /// Returns the team as stored afterwards.
    async fn upsert_team(&self, team: &Team) -> Result<Team, RepositoryError>;

    /// Set a user's active flag. Returns the updated user, or None if not found.
    async fn set_user_active(
        &self,
        id: &UserId,
        is_active: bool,
    ) -> Result<Option<User>, RepositoryError>;

    /// Mark every member of a team inactive.
    ///
    /// Returns how many users changed, or None if the team does not exist.
    async fn deactivate_team(&self, name: &TeamName) -> Result<Option<usize>, RepositoryError>;
}

/// Storage for pull requests and their reviewer assignments.
#[async_trait]
pub trait PullRequestRepository: Send + Sync {
    /// Store a new pull request together with its reviewers.
    ///
    /// Fails with `Conflict` if the id is already taken.
    async fn create(&self, pr: &PullRequest) -> Result<(), RepositoryError>;

    /// Get a pull request, returning None if not found.
    async fn get(&self, id: &PullRequestId) -> Result<Option<PullRequest>, RepositoryError>;

    /// Move an `OPEN` pull request to `MERGED` with the given merge time.
    ///
    /// Fails with `Conflict` if the pull request is missing or no longer open.
    async fn mark_merged(
        &self,
        id: &PullRequestId,
        merged_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;

    /// Replace `old_reviewer` with `new_reviewer` in the same slot.
    ///
    /// Fails with `Conflict` unless the pull request is open, `old_reviewer`
    /// is assigned, and `new_reviewer` is not.
    async fn swap_reviewer(
        &self,
        id: &PullRequestId,
        old_reviewer: &UserId,
        new_reviewer: &UserId,
    ) -> Result<(), RepositoryError>;

    /// Pull requests where the user is a reviewer, newest first.
    async fn list_by_reviewer(&self, reviewer: &UserId)
        -> Result<Vec<PullRequest>, RepositoryError>;

    /// All pull requests, newest first.
    async fn list_all(&self) -> Result<Vec<PullRequest>, RepositoryError>;
}
