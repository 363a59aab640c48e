use std::sync::Arc;

use tracing::info;

use reviewer_core::{DomainError, PullRequest, Resource, User, UserId};

use super::{PullRequestService, ServiceResult};
use crate::repository::UserTeamRepository;

/// User activation and per-user review listings.
pub struct UserService {
    users: Arc<dyn UserTeamRepository>,
    pull_requests: Arc<PullRequestService>,
}

impl UserService {
    pub fn new(users: Arc<dyn UserTeamRepository>, pull_requests: Arc<PullRequestService>) -> Self {
        Self {
            users,
            pull_requests,
        }
    }

    /// Set whether the user can be picked as a reviewer.
    ///
    /// Existing assignments are not touched.
    pub async fn set_active(&self, id: &UserId, is_active: bool) -> ServiceResult<User> {
        let user = self
            .users
            .get_user(id)
            .await?
            .ok_or_else(|| DomainError::not_found(Resource::User, id))?;
        if user.is_active == is_active {
            return Ok(user);
        }

        let updated = self
            .users
            .set_user_active(id, is_active)
            .await?
            .ok_or_else(|| DomainError::not_found(Resource::User, id))?;
        info!("Set user {} active={}", id, is_active);
        Ok(updated)
    }

    /// Pull requests the user is assigned to review, newest first.
    pub async fn reviews(&self, id: &UserId) -> ServiceResult<Vec<PullRequest>> {
        self.pull_requests.list_by_reviewer(id).await
    }
}
