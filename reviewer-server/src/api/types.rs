//! Request and response bodies for the HTTP API.
//!
//! Request string fields default to empty when absent so that a missing
//! field is reported by the validator with a field-specific message instead
//! of a generic decoding error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use reviewer_core::{PrStatus, PullRequest, Team, User};

use crate::service::PullRequestStats;

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TeamMemberRequest {
    pub user_id: String,
    pub username: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CreateTeamRequest {
    pub team_name: String,
    pub members: Vec<TeamMemberRequest>,
}

impl CreateTeamRequest {
    pub fn into_team(self) -> Team {
        let team_name = self.team_name;
        let members = self
            .members
            .into_iter()
            .map(|m| User::new(m.user_id, m.username, m.is_active, team_name.as_str()))
            .collect();
        Team::new(team_name, members)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SetUserActiveRequest {
    pub user_id: String,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CreatePullRequestRequest {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub author_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MergePullRequestRequest {
    pub pull_request_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReassignReviewerRequest {
    pub pull_request_id: String,
    pub old_reviewer_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TeamQuery {
    pub team_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserQuery {
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PullRequestQuery {
    pub pull_request_id: Option<String>,
}

// =============================================================================
// Responses
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDto {
    pub user_id: String,
    pub username: String,
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub team_name: String,
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        Self {
            user_id: user.id.0,
            username: user.username,
            is_active: user.is_active,
            team_name: user.team_name.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamDto {
    pub team_name: String,
    pub members: Vec<UserDto>,
}

impl From<Team> for TeamDto {
    fn from(team: Team) -> Self {
        Self {
            team_name: team.name.0,
            members: team.members.into_iter().map(UserDto::from).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestDto {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub author_id: String,
    pub status: PrStatus,
    pub assigned_reviewers: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged_at: Option<DateTime<Utc>>,
}

impl From<PullRequest> for PullRequestDto {
    fn from(pr: PullRequest) -> Self {
        Self {
            pull_request_id: pr.id.0,
            pull_request_name: pr.name,
            author_id: pr.author_id.0,
            status: pr.status,
            assigned_reviewers: pr.reviewers.into_iter().map(|r| r.0).collect(),
            created_at: pr.created_at,
            merged_at: pr.merged_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamResponse {
    pub team: TeamDto,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeactivateResponse {
    pub team_name: String,
    /// Number of members that were active before the call.
    pub deactivated: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub user: UserDto,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserReviewsResponse {
    pub user_id: String,
    pub pull_requests: Vec<PullRequestDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestResponse {
    pub pr: PullRequestDto,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReassignResponse {
    pub pr: PullRequestDto,
    pub replaced_by: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: PullRequestStats,
    pub pull_requests: Vec<PullRequestDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
}

/// Shorthand used by the handlers.
pub(crate) fn pull_request_dtos(prs: Vec<PullRequest>) -> Vec<PullRequestDto> {
    prs.into_iter().map(PullRequestDto::from).collect()
}
