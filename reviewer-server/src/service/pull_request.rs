//! Pull request lifecycle orchestration.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Arc, PoisonError};

use chrono::{DateTime, SubsecRound, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use reviewer_core::lifecycle;
use reviewer_core::{
    DomainError, MergeOutcome, PrStatus, PullRequest, PullRequestId, Resource, ReviewerAssigner,
    UserId,
};

use super::{ServiceError, ServiceResult};
use crate::repository::{PullRequestRepository, RepositoryError, UserTeamRepository};

/// Result of a successful reassignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reassignment {
    pub pr: PullRequest,
    pub replaced_by: UserId,
}

/// Aggregate counts over every stored pull request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PullRequestStats {
    pub total_pull_requests: usize,
    pub open: usize,
    pub merged: usize,
    /// Number of pull requests each user currently reviews.
    pub assignments_by_reviewer: BTreeMap<UserId, usize>,
}

impl PullRequestStats {
    pub fn from_pull_requests(prs: &[PullRequest]) -> Self {
        let mut stats = Self {
            total_pull_requests: prs.len(),
            ..Self::default()
        };
        for pr in prs {
            match pr.status {
                PrStatus::Open => stats.open += 1,
                PrStatus::Merged => stats.merged += 1,
            }
            for reviewer in &pr.reviewers {
                *stats
                    .assignments_by_reviewer
                    .entry(reviewer.clone())
                    .or_default() += 1;
            }
        }
        stats
    }
}

/// Creates, merges, and reassigns pull requests.
///
/// # Concurrency
///
/// Mutations of one pull request hold that pull request's lock across
/// read, decide, and write, so two reassignments of the same pull request
/// cannot both pick a replacement from the same stale reviewer list. The
/// repositories re-check the precondition on write as well; a lost race
/// there surfaces as [`ServiceError::Conflict`].
pub struct PullRequestService {
    prs: Arc<dyn PullRequestRepository>,
    users: Arc<dyn UserTeamRepository>,
    assigner: ReviewerAssigner,
    /// Never held across an `.await`.
    rng: std::sync::Mutex<StdRng>,
    pr_locks: RwLock<HashMap<PullRequestId, Arc<Mutex<()>>>>,
}

impl PullRequestService {
    /// Create the service. With a `seed`, reviewer selection is reproducible.
    pub fn new(
        prs: Arc<dyn PullRequestRepository>,
        users: Arc<dyn UserTeamRepository>,
        assigner: ReviewerAssigner,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            prs,
            users,
            assigner,
            rng: std::sync::Mutex::new(rng),
            pr_locks: RwLock::new(HashMap::new()),
        }
    }

    /// Get or create the lock for a specific pull request.
    async fn get_or_create_pr_lock(&self, id: &PullRequestId) -> Arc<Mutex<()>> {
        // Fast path: check if lock already exists
        {
            let locks = self.pr_locks.read().await;
            if let Some(lock) = locks.get(id) {
                return lock.clone();
            }
        }

        // Slow path: create lock (double-check after acquiring write lock)
        let mut locks = self.pr_locks.write().await;
        locks
            .entry(id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop lock entries that nobody holds or waits on.
    ///
    /// This also clears entries left behind by a cancelled operation, so the
    /// map only ever holds pull requests with work in flight.
    async fn release_pr_lock(&self, lock: Arc<Mutex<()>>) {
        let mut locks = self.pr_locks.write().await;
        drop(lock);
        // Clones are only taken under this map's lock, so a count of one
        // cannot grow while we hold it.
        locks.retain(|_, held| Arc::strong_count(held) > 1);
    }

    /// Run `f` while holding the pull request's lock.
    async fn with_pr_lock<T, F, Fut>(&self, id: &PullRequestId, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let pr_lock = self.get_or_create_pr_lock(id).await;
        let guard = pr_lock.lock().await;
        let result = f().await;
        drop(guard);
        self.release_pr_lock(pr_lock).await;
        result
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        // The generator has no invariants a panic could break.
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut rng)
    }

    /// Current time at the precision the stores keep.
    fn now() -> DateTime<Utc> {
        Utc::now().trunc_subsecs(6)
    }

    /// Open a new pull request and assign up to the configured number of
    /// reviewers from the author's team.
    pub async fn create(
        &self,
        id: PullRequestId,
        name: String,
        author_id: UserId,
    ) -> ServiceResult<PullRequest> {
        let key = id.clone();
        self.with_pr_lock(&key, || self.create_locked(id, name, author_id))
            .await
    }

    async fn create_locked(
        &self,
        id: PullRequestId,
        name: String,
        author_id: UserId,
    ) -> ServiceResult<PullRequest> {
        if self.prs.get(&id).await?.is_some() {
            return Err(DomainError::AlreadyExists { id }.into());
        }

        let author = self
            .users
            .get_user(&author_id)
            .await?
            .ok_or_else(|| DomainError::not_found(Resource::User, &author_id))?;
        let team = self
            .users
            .get_team(&author.team_name)
            .await?
            .ok_or_else(|| DomainError::not_found(Resource::Team, &author.team_name))?;

        let reviewers =
            self.with_rng(|rng| self.assigner.initial(&team.members, &author.id, rng));
        let pr = lifecycle::open(id, name, author_id, reviewers, Self::now());

        match self.prs.create(&pr).await {
            Ok(()) => {}
            Err(RepositoryError::Conflict { .. }) => {
                return Err(DomainError::AlreadyExists { id: pr.id }.into());
            }
            Err(e) => return Err(e.into()),
        }

        info!(
            "Created pull request {} by {} with reviewers {:?}",
            pr.id, pr.author_id, pr.reviewers
        );
        Ok(pr)
    }

    pub async fn get(&self, id: &PullRequestId) -> ServiceResult<PullRequest> {
        self.prs
            .get(id)
            .await?
            .ok_or_else(|| DomainError::not_found(Resource::PullRequest, id).into())
    }

    /// Merge a pull request. Merging an already merged pull request returns
    /// it unchanged.
    pub async fn merge(&self, id: &PullRequestId) -> ServiceResult<PullRequest> {
        self.with_pr_lock(id, || self.merge_locked(id)).await
    }

    async fn merge_locked(&self, id: &PullRequestId) -> ServiceResult<PullRequest> {
        let pr = self.get(id).await?;
        let now = Self::now();

        let merged = match lifecycle::merge(pr, now) {
            MergeOutcome::AlreadyMerged(pr) => {
                debug!("Pull request {} already merged", id);
                return Ok(pr);
            }
            MergeOutcome::Merged(pr) => pr,
        };

        match self.prs.mark_merged(id, now).await {
            Ok(()) => {
                info!("Merged pull request {}", id);
                Ok(merged)
            }
            Err(RepositoryError::Conflict { what }) => {
                // Another process merged it between our read and write.
                warn!("Merge of {} lost a race: {}", id, what);
                let current = self.get(id).await?;
                if current.status == PrStatus::Merged {
                    Ok(current)
                } else {
                    Err(ServiceError::Conflict(what))
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Replace `old_reviewer` with a random eligible member of the author's team.
    pub async fn reassign(
        &self,
        id: &PullRequestId,
        old_reviewer: &UserId,
    ) -> ServiceResult<Reassignment> {
        self.with_pr_lock(id, || self.reassign_locked(id, old_reviewer))
            .await
    }

    async fn reassign_locked(
        &self,
        id: &PullRequestId,
        old_reviewer: &UserId,
    ) -> ServiceResult<Reassignment> {
        let pr = self.get(id).await?;
        lifecycle::check_reassignable(&pr, old_reviewer)?;

        let author = self.users.get_user(&pr.author_id).await?.ok_or_else(|| {
            ServiceError::Integrity(format!(
                "author {} of pull request {} does not exist",
                pr.author_id, pr.id
            ))
        })?;
        let team = self
            .users
            .get_team(&author.team_name)
            .await?
            .ok_or_else(|| {
                ServiceError::Integrity(format!(
                    "team {} of author {} does not exist",
                    author.team_name, author.id
                ))
            })?;

        let replacement = self
            .with_rng(|rng| {
                self.assigner
                    .replacement(&team.members, &pr.author_id, &pr.reviewers, rng)
            })
            .map_err(|e| e.for_pull_request(&pr.id))?;

        self.prs.swap_reviewer(id, old_reviewer, &replacement).await?;

        info!(
            "Reassigned pull request {}: {} -> {}",
            id, old_reviewer, replacement
        );
        let pr = lifecycle::replace_reviewer(pr, old_reviewer, replacement.clone());
        Ok(Reassignment {
            pr,
            replaced_by: replacement,
        })
    }

    /// Pull requests the user reviews, newest first.
    pub async fn list_by_reviewer(&self, user_id: &UserId) -> ServiceResult<Vec<PullRequest>> {
        if self.users.get_user(user_id).await?.is_none() {
            return Err(DomainError::not_found(Resource::User, user_id).into());
        }
        Ok(self.prs.list_by_reviewer(user_id).await?)
    }

    pub async fn list_all(&self) -> ServiceResult<Vec<PullRequest>> {
        Ok(self.prs.list_all().await?)
    }
}
