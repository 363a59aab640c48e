pub mod api;
pub mod config;
pub mod repository;
pub mod service;
pub mod validation;

use std::sync::Arc;

use reviewer_core::ReviewerAssigner;

use repository::{PullRequestRepository, UserTeamRepository};
use service::{PullRequestService, TeamService, UserService};
use validation::RequestValidator;

pub use api::router;

/// Shared state handed to every HTTP handler.
pub struct AppState {
    pub pull_requests: Arc<PullRequestService>,
    pub teams: TeamService,
    pub users: UserService,
    pub validator: RequestValidator,
}

impl AppState {
    pub fn new(
        prs: Arc<dyn PullRequestRepository>,
        users: Arc<dyn UserTeamRepository>,
        assigner: ReviewerAssigner,
        rng_seed: Option<u64>,
    ) -> Self {
        let pull_requests = Arc::new(PullRequestService::new(
            prs,
            users.clone(),
            assigner,
            rng_seed,
        ));
        Self {
            teams: TeamService::new(users.clone()),
            users: UserService::new(users, pull_requests.clone()),
            pull_requests,
            validator: RequestValidator::new(),
        }
    }

    /// Build state over a single backend that stores both teams and pull requests.
    pub fn with_repository<R>(
        repo: Arc<R>,
        assigner: ReviewerAssigner,
        rng_seed: Option<u64>,
    ) -> Self
    where
        R: PullRequestRepository + UserTeamRepository + 'static,
    {
        Self::new(repo.clone(), repo, assigner, rng_seed)
    }
}
