//! Reviewer selection.
//!
//! Selection is uniformly random and keeps no rotation state. Every function
//! takes the random number generator as a parameter; tests pin the outcome
//! with a seeded `StdRng`.
//!
//! The author and inactive members are never candidates. Because candidates
//! are picked from a deduplicated pool without replacement, the resulting
//! reviewer list cannot contain duplicates.

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;

use crate::error::DomainError;
use crate::model::{PullRequestId, User, UserId};

/// Number of reviewers assigned to a new pull request when the team is big enough.
pub const DEFAULT_MAX_REVIEWERS: usize = 2;

/// No eligible member is left to take over a review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no eligible replacement reviewer")]
pub struct NoCandidate;

impl NoCandidate {
    pub fn for_pull_request(self, pr_id: &PullRequestId) -> DomainError {
        DomainError::NoCandidate {
            pr_id: pr_id.clone(),
        }
    }
}

/// Active members other than the author and anyone in `excluded`, each id once,
/// in roster order.
fn candidate_pool<'a>(
    members: &'a [User],
    author_id: &UserId,
    excluded: &[UserId],
) -> Vec<&'a UserId> {
    let mut seen = HashSet::new();
    members
        .iter()
        .filter(|m| m.is_active && &m.id != author_id && !excluded.contains(&m.id))
        .map(|m| &m.id)
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Pick up to `max_count` distinct reviewers for a new pull request.
///
/// Returns an empty list when nobody is eligible; a pull request may
/// legitimately have no reviewers.
pub fn select_initial_reviewers<R: Rng + ?Sized>(
    members: &[User],
    author_id: &UserId,
    max_count: usize,
    rng: &mut R,
) -> Vec<UserId> {
    let mut pool = candidate_pool(members, author_id, &[]);
    if pool.is_empty() {
        return Vec::new();
    }

    let count = max_count.min(pool.len());
    pool.shuffle(rng);
    pool.into_iter().take(count).cloned().collect()
}

/// Pick one member to replace a reviewer.
///
/// Current reviewers (including the one being replaced) are excluded, so the
/// replacement never duplicates a reviewer already on the pull request.
pub fn select_replacement_reviewer<R: Rng + ?Sized>(
    members: &[User],
    author_id: &UserId,
    current_reviewers: &[UserId],
    rng: &mut R,
) -> Result<UserId, NoCandidate> {
    let pool = candidate_pool(members, author_id, current_reviewers);
    pool.choose(rng).map(|id| (*id).clone()).ok_or(NoCandidate)
}

/// Selection rules with the configured reviewer cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewerAssigner {
    max_reviewers: usize,
}

impl Default for ReviewerAssigner {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REVIEWERS)
    }
}

impl ReviewerAssigner {
    pub fn new(max_reviewers: usize) -> Self {
        Self { max_reviewers }
    }

    pub fn max_reviewers(&self) -> usize {
        self.max_reviewers
    }

    pub fn initial<R: Rng + ?Sized>(
        &self,
        members: &[User],
        author_id: &UserId,
        rng: &mut R,
    ) -> Vec<UserId> {
        select_initial_reviewers(members, author_id, self.max_reviewers, rng)
    }

    pub fn replacement<R: Rng + ?Sized>(
        &self,
        members: &[User],
        author_id: &UserId,
        current_reviewers: &[UserId],
        rng: &mut R,
    ) -> Result<UserId, NoCandidate> {
        select_replacement_reviewer(members, author_id, current_reviewers, rng)
    }
}
