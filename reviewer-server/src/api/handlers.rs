//! HTTP handlers.
//!
//! Each handler decodes its input, runs the validator, calls one service
//! method, and wraps the result in the response shape from [`super::types`].

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    Json,
};

use reviewer_core::{PullRequestId, TeamName, UserId};

use super::error::ApiResult;
use super::types::{
    pull_request_dtos, CreatePullRequestRequest, CreateTeamRequest, DeactivateResponse,
    HealthResponse, MergePullRequestRequest, PullRequestQuery, PullRequestResponse,
    ReassignResponse, ReassignReviewerRequest, SetUserActiveRequest, StatsResponse, TeamDto,
    TeamQuery, TeamResponse, UserQuery, UserResponse, UserReviewsResponse,
};
use crate::service::PullRequestStats;
use crate::AppState;

type JsonBody<T> = Result<Json<T>, JsonRejection>;
type QueryParams<T> = Result<Query<T>, QueryRejection>;

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "reviewer".to_string(),
    })
}

// =============================================================================
// Teams
// =============================================================================

pub async fn add_team(
    State(state): State<Arc<AppState>>,
    body: JsonBody<CreateTeamRequest>,
) -> ApiResult<(StatusCode, Json<TeamResponse>)> {
    let Json(req) = body?;
    state.validator.create_team(&req)?;

    let team = state.teams.add(req.into_team()).await?;
    Ok((
        StatusCode::CREATED,
        Json(TeamResponse { team: team.into() }),
    ))
}

pub async fn get_team(
    State(state): State<Arc<AppState>>,
    query: QueryParams<TeamQuery>,
) -> ApiResult<Json<TeamDto>> {
    let Query(query) = query?;
    let name = state
        .validator
        .id_param("team_name", query.team_name.as_deref())?;

    let team = state.teams.get(&TeamName::from(name)).await?;
    Ok(Json(team.into()))
}

pub async fn deactivate_team(
    State(state): State<Arc<AppState>>,
    query: QueryParams<TeamQuery>,
) -> ApiResult<Json<DeactivateResponse>> {
    let Query(query) = query?;
    let name = state
        .validator
        .id_param("team_name", query.team_name.as_deref())?;

    let deactivated = state.teams.deactivate(&TeamName::from(name)).await?;
    Ok(Json(DeactivateResponse {
        team_name: name.to_string(),
        deactivated,
    }))
}

// =============================================================================
// Users
// =============================================================================

pub async fn set_user_active(
    State(state): State<Arc<AppState>>,
    body: JsonBody<SetUserActiveRequest>,
) -> ApiResult<Json<UserResponse>> {
    let Json(req) = body?;
    let is_active = state.validator.set_user_active(&req)?;

    let user = state
        .users
        .set_active(&UserId::from(req.user_id), is_active)
        .await?;
    Ok(Json(UserResponse { user: user.into() }))
}

pub async fn get_user_reviews(
    State(state): State<Arc<AppState>>,
    query: QueryParams<UserQuery>,
) -> ApiResult<Json<UserReviewsResponse>> {
    let Query(query) = query?;
    let user_id = state
        .validator
        .id_param("user_id", query.user_id.as_deref())?;

    let prs = state.users.reviews(&UserId::from(user_id)).await?;
    Ok(Json(UserReviewsResponse {
        user_id: user_id.to_string(),
        pull_requests: pull_request_dtos(prs),
    }))
}

// =============================================================================
// Pull requests
// =============================================================================

pub async fn create_pull_request(
    State(state): State<Arc<AppState>>,
    body: JsonBody<CreatePullRequestRequest>,
) -> ApiResult<(StatusCode, Json<PullRequestResponse>)> {
    let Json(req) = body?;
    state.validator.create_pull_request(&req)?;

    let pr = state
        .pull_requests
        .create(
            PullRequestId::from(req.pull_request_id),
            req.pull_request_name,
            UserId::from(req.author_id),
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(PullRequestResponse { pr: pr.into() }),
    ))
}

pub async fn merge_pull_request(
    State(state): State<Arc<AppState>>,
    body: JsonBody<MergePullRequestRequest>,
) -> ApiResult<Json<PullRequestResponse>> {
    let Json(req) = body?;
    state.validator.merge_pull_request(&req)?;

    let pr = state
        .pull_requests
        .merge(&PullRequestId::from(req.pull_request_id))
        .await?;
    Ok(Json(PullRequestResponse { pr: pr.into() }))
}

pub async fn reassign_reviewer(
    State(state): State<Arc<AppState>>,
    body: JsonBody<ReassignReviewerRequest>,
) -> ApiResult<Json<ReassignResponse>> {
    let Json(req) = body?;
    state.validator.reassign_reviewer(&req)?;

    let result = state
        .pull_requests
        .reassign(
            &PullRequestId::from(req.pull_request_id),
            &UserId::from(req.old_reviewer_id),
        )
        .await?;
    Ok(Json(ReassignResponse {
        pr: result.pr.into(),
        replaced_by: result.replaced_by.0,
    }))
}

pub async fn get_pull_request(
    State(state): State<Arc<AppState>>,
    query: QueryParams<PullRequestQuery>,
) -> ApiResult<Json<PullRequestResponse>> {
    let Query(query) = query?;
    let id = state
        .validator
        .id_param("pull_request_id", query.pull_request_id.as_deref())?;

    let pr = state.pull_requests.get(&PullRequestId::from(id)).await?;
    Ok(Json(PullRequestResponse { pr: pr.into() }))
}

pub async fn get_stats(State(state): State<Arc<AppState>>) -> ApiResult<Json<StatsResponse>> {
    let prs = state.pull_requests.list_all().await?;
    Ok(Json(StatsResponse {
        stats: PullRequestStats::from_pull_requests(&prs),
        pull_requests: pull_request_dtos(prs),
    }))
}
