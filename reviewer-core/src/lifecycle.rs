//! Pull request state transitions.
//!
//! A pull request is created `OPEN` and may move to `MERGED` exactly once.
//! `MERGED` is terminal. These functions are pure: they take the current
//! value and return the next one, leaving persistence to the caller.

use chrono::{DateTime, Utc};

use crate::error::DomainError;
use crate::model::{PrStatus, PullRequest, PullRequestId, UserId};

/// Build a freshly opened pull request.
///
/// `reviewers` must already satisfy the assignment rules (see
/// [`crate::assignment`]).
pub fn open(
    id: PullRequestId,
    name: impl Into<String>,
    author_id: UserId,
    reviewers: Vec<UserId>,
    now: DateTime<Utc>,
) -> PullRequest {
    debug_assert!(!reviewers.contains(&author_id));
    PullRequest {
        id,
        name: name.into(),
        author_id,
        status: PrStatus::Open,
        reviewers,
        created_at: now,
        merged_at: None,
    }
}

/// Result of asking to merge a pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The pull request moved from `OPEN` to `MERGED`; persist it.
    Merged(PullRequest),
    /// It was already merged; nothing changed and nothing needs writing.
    AlreadyMerged(PullRequest),
}

impl MergeOutcome {
    pub fn into_inner(self) -> PullRequest {
        match self {
            Self::Merged(pr) | Self::AlreadyMerged(pr) => pr,
        }
    }
}

/// Merge a pull request. Repeating the merge is not an error and keeps the
/// original `merged_at`.
pub fn merge(pr: PullRequest, now: DateTime<Utc>) -> MergeOutcome {
    match pr.status {
        PrStatus::Merged => MergeOutcome::AlreadyMerged(pr),
        PrStatus::Open => MergeOutcome::Merged(PullRequest {
            status: PrStatus::Merged,
            merged_at: Some(now),
            ..pr
        }),
    }
}

/// Check that `old_reviewer` can be swapped out of `pr`.
///
/// Status is checked before membership: asking to reassign on a merged pull
/// request is always `AlreadyMerged`, whoever the reviewer is.
pub fn check_reassignable(pr: &PullRequest, old_reviewer: &UserId) -> Result<(), DomainError> {
    if !pr.is_open() {
        return Err(DomainError::AlreadyMerged { id: pr.id.clone() });
    }
    if !pr.has_reviewer(old_reviewer) {
        return Err(DomainError::NotAssigned {
            pr_id: pr.id.clone(),
            reviewer_id: old_reviewer.clone(),
        });
    }
    Ok(())
}

/// Put `new_reviewer` into the slot held by `old_reviewer`.
pub fn replace_reviewer(
    mut pr: PullRequest,
    old_reviewer: &UserId,
    new_reviewer: UserId,
) -> PullRequest {
    if let Some(slot) = pr.reviewers.iter_mut().find(|r| *r == old_reviewer) {
        *slot = new_reviewer;
    }
    pr
}
