use std::sync::Arc;

use tracing::info;

use reviewer_core::{DomainError, Resource, Team, TeamName};

use super::ServiceResult;
use crate::repository::UserTeamRepository;

/// Team registration and bulk deactivation.
pub struct TeamService {
    users: Arc<dyn UserTeamRepository>,
}

impl TeamService {
    pub fn new(users: Arc<dyn UserTeamRepository>) -> Self {
        Self { users }
    }

    /// Register a team, adding any members not already known.
    ///
    /// Submitting an existing team is not an error. Users that already exist
    /// keep their current record and team.
    pub async fn add(&self, team: Team) -> ServiceResult<Team> {
        let stored = self.users.upsert_team(&team).await?;
        info!(
            "Team {} now has {} members ({} submitted)",
            stored.name,
            stored.members.len(),
            team.members.len()
        );
        Ok(stored)
    }

    pub async fn get(&self, name: &TeamName) -> ServiceResult<Team> {
        self.users
            .get_team(name)
            .await?
            .ok_or_else(|| DomainError::not_found(Resource::Team, name).into())
    }

    /// Mark every member inactive. Returns how many users changed.
    pub async fn deactivate(&self, name: &TeamName) -> ServiceResult<usize> {
        let changed = self
            .users
            .deactivate_team(name)
            .await?
            .ok_or_else(|| DomainError::not_found(Resource::Team, name))?;
        info!("Deactivated {} members of team {}", changed, name);
        Ok(changed)
    }
}
