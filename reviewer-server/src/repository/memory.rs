//! In-memory implementation of the repository traits.
//!
//! All state is held in one `RwLock`-protected struct and lost on restart.
//! Taking a single write lock per mutation makes every multi-row write atomic.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use reviewer_core::{PrStatus, PullRequest, PullRequestId, Team, TeamName, User, UserId};

use super::{PullRequestRepository, RepositoryError, UserTeamRepository};

#[derive(Default)]
struct Inner {
    users: HashMap<UserId, User>,
    /// Member ids per team, in the order they joined.
    teams: HashMap<TeamName, Vec<UserId>>,
    prs: HashMap<PullRequestId, PullRequest>,
}

impl Inner {
    fn team(&self, name: &TeamName) -> Option<Team> {
        let member_ids = self.teams.get(name)?;
        let members = member_ids
            .iter()
            .filter_map(|id| self.users.get(id).cloned())
            .collect();
        Some(Team {
            name: name.clone(),
            members,
        })
    }
}

/// Newest first; ties broken by id so listings are stable.
fn sort_newest_first(prs: &mut [PullRequest]) {
    prs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
}

/// In-memory repository for teams, users, and pull requests.
pub struct InMemoryRepository {
    inner: RwLock<Inner>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserTeamRepository for InMemoryRepository {
    async fn get_user(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let inner = self.inner.read().await;
        Ok(inner.users.get(id).cloned())
    }

    async fn get_team(&self, name: &TeamName) -> Result<Option<Team>, RepositoryError> {
        let inner = self.inner.read().await;
        Ok(inner.team(name))
    }

    async fn upsert_team(&self, team: &Team) -> Result<Team, RepositoryError> {
        let mut inner = self.inner.write().await;
        inner.teams.entry(team.name.clone()).or_default();

        for member in &team.members {
            if inner.users.contains_key(&member.id) {
                continue;
            }
            let user = User {
                team_name: team.name.clone(),
                ..member.clone()
            };
            inner.users.insert(user.id.clone(), user);
            inner
                .teams
                .entry(team.name.clone())
                .or_default()
                .push(member.id.clone());
        }

        inner
            .team(&team.name)
            .ok_or_else(|| RepositoryError::storage("upsert team", "team vanished after insert"))
    }

    async fn set_user_active(
        &self,
        id: &UserId,
        is_active: bool,
    ) -> Result<Option<User>, RepositoryError> {
        let mut inner = self.inner.write().await;
        Ok(inner.users.get_mut(id).map(|user| {
            user.is_active = is_active;
            user.clone()
        }))
    }

    async fn deactivate_team(&self, name: &TeamName) -> Result<Option<usize>, RepositoryError> {
        let mut inner = self.inner.write().await;
        let Some(member_ids) = inner.teams.get(name).cloned() else {
            return Ok(None);
        };

        let mut changed = 0;
        for id in member_ids {
            if let Some(user) = inner.users.get_mut(&id) {
                if user.is_active {
                    user.is_active = false;
                    changed += 1;
                }
            }
        }
        Ok(Some(changed))
    }
}

#[async_trait]
impl PullRequestRepository for InMemoryRepository {
    async fn create(&self, pr: &PullRequest) -> Result<(), RepositoryError> {
        let mut inner = self.inner.write().await;
        if inner.prs.contains_key(&pr.id) {
            return Err(RepositoryError::conflict(format!(
                "pull request {} already exists",
                pr.id
            )));
        }
        inner.prs.insert(pr.id.clone(), pr.clone());
        Ok(())
    }

    async fn get(&self, id: &PullRequestId) -> Result<Option<PullRequest>, RepositoryError> {
        let inner = self.inner.read().await;
        Ok(inner.prs.get(id).cloned())
    }

    async fn mark_merged(
        &self,
        id: &PullRequestId,
        merged_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut inner = self.inner.write().await;
        match inner.prs.get_mut(id) {
            Some(pr) if pr.is_open() => {
                pr.status = PrStatus::Merged;
                pr.merged_at = Some(merged_at);
                Ok(())
            }
            Some(_) => Err(RepositoryError::conflict(format!(
                "pull request {} is not open",
                id
            ))),
            None => Err(RepositoryError::conflict(format!(
                "pull request {} does not exist",
                id
            ))),
        }
    }

    async fn swap_reviewer(
        &self,
        id: &PullRequestId,
        old_reviewer: &UserId,
        new_reviewer: &UserId,
    ) -> Result<(), RepositoryError> {
        let mut inner = self.inner.write().await;
        let Some(pr) = inner.prs.get_mut(id) else {
            return Err(RepositoryError::conflict(format!(
                "pull request {} does not exist",
                id
            )));
        };

        if !pr.is_open() {
            return Err(RepositoryError::conflict(format!(
                "pull request {} is not open",
                id
            )));
        }
        if pr.has_reviewer(new_reviewer) {
            return Err(RepositoryError::conflict(format!(
                "{} already reviews pull request {}",
                new_reviewer, id
            )));
        }
        let Some(slot) = pr.reviewers.iter_mut().find(|r| *r == old_reviewer) else {
            return Err(RepositoryError::conflict(format!(
                "{} no longer reviews pull request {}",
                old_reviewer, id
            )));
        };

        *slot = new_reviewer.clone();
        Ok(())
    }

    async fn list_by_reviewer(
        &self,
        reviewer: &UserId,
    ) -> Result<Vec<PullRequest>, RepositoryError> {
        let inner = self.inner.read().await;
        let mut prs: Vec<PullRequest> = inner
            .prs
            .values()
            .filter(|pr| pr.has_reviewer(reviewer))
            .cloned()
            .collect();
        sort_newest_first(&mut prs);
        Ok(prs)
    }

    async fn list_all(&self) -> Result<Vec<PullRequest>, RepositoryError> {
        let inner = self.inner.read().await;
        let mut prs: Vec<PullRequest> = inner.prs.values().cloned().collect();
        sort_newest_first(&mut prs);
        Ok(prs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn user(id: &str, active: bool) -> User {
        User::new(id, format!("name-{}", id), active, "")
    }

    fn pr(id: &str, reviewers: &[&str], created: i64) -> PullRequest {
        PullRequest {
            id: id.into(),
            name: format!("PR {}", id),
            author_id: "u1".into(),
            status: PrStatus::Open,
            reviewers: reviewers.iter().map(|r| UserId::from(*r)).collect(),
            created_at: t(created),
            merged_at: None,
        }
    }

    #[tokio::test]
    async fn test_upsert_team_assigns_team_name() {
        let repo = InMemoryRepository::new();
        let team = Team::new("qa", vec![user("u1", true), user("u2", false)]);

        let stored = repo.upsert_team(&team).await.unwrap();
        assert_eq!(stored.members.len(), 2);
        assert!(stored.members.iter().all(|m| m.team_name == TeamName::from("qa")));

        let u2 = repo.get_user(&"u2".into()).await.unwrap().unwrap();
        assert!(!u2.is_active);
    }

    #[tokio::test]
    async fn test_upsert_team_is_idempotent_for_known_users() {
        let repo = InMemoryRepository::new();
        repo.upsert_team(&Team::new("qa", vec![user("u1", true)]))
            .await
            .unwrap();

        // Same id resubmitted with different details, plus a new member.
        let stored = repo
            .upsert_team(&Team::new("qa", vec![user("u1", false), user("u2", true)]))
            .await
            .unwrap();

        assert_eq!(stored.members.len(), 2);
        assert!(stored.member(&"u1".into()).unwrap().is_active);
    }

    #[tokio::test]
    async fn test_user_in_other_team_is_not_moved() {
        let repo = InMemoryRepository::new();
        repo.upsert_team(&Team::new("qa", vec![user("u1", true)]))
            .await
            .unwrap();
        let backend = repo
            .upsert_team(&Team::new("backend", vec![user("u1", true)]))
            .await
            .unwrap();

        assert!(backend.members.is_empty());
        let u1 = repo.get_user(&"u1".into()).await.unwrap().unwrap();
        assert_eq!(u1.team_name, TeamName::from("qa"));
    }

    #[tokio::test]
    async fn test_deactivate_team_counts_changes() {
        let repo = InMemoryRepository::new();
        repo.upsert_team(&Team::new(
            "qa",
            vec![user("u1", true), user("u2", false), user("u3", true)],
        ))
        .await
        .unwrap();

        assert_eq!(repo.deactivate_team(&"qa".into()).await.unwrap(), Some(2));
        assert_eq!(repo.deactivate_team(&"qa".into()).await.unwrap(), Some(0));
        assert_eq!(repo.deactivate_team(&"nope".into()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_id() {
        let repo = InMemoryRepository::new();
        repo.create(&pr("pr-1", &["u2"], 1)).await.unwrap();

        let err = repo.create(&pr("pr-1", &["u3"], 2)).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict { .. }));
        let stored = repo.get(&"pr-1".into()).await.unwrap().unwrap();
        assert_eq!(stored.reviewers, vec![UserId::from("u2")]);
    }

    #[tokio::test]
    async fn test_mark_merged_only_once() {
        let repo = InMemoryRepository::new();
        repo.create(&pr("pr-1", &[], 1)).await.unwrap();

        repo.mark_merged(&"pr-1".into(), t(5)).await.unwrap();
        let err = repo.mark_merged(&"pr-1".into(), t(9)).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict { .. }));

        let stored = repo.get(&"pr-1".into()).await.unwrap().unwrap();
        assert_eq!(stored.merged_at, Some(t(5)));
    }

    #[tokio::test]
    async fn test_swap_reviewer_guards() {
        let repo = InMemoryRepository::new();
        repo.create(&pr("pr-1", &["u2", "u3"], 1)).await.unwrap();

        repo.swap_reviewer(&"pr-1".into(), &"u2".into(), &"u4".into())
            .await
            .unwrap();
        let stored = repo.get(&"pr-1".into()).await.unwrap().unwrap();
        assert_eq!(stored.reviewers, vec![UserId::from("u4"), UserId::from("u3")]);

        // Old reviewer gone.
        assert!(repo
            .swap_reviewer(&"pr-1".into(), &"u2".into(), &"u5".into())
            .await
            .is_err());
        // Replacement already assigned.
        assert!(repo
            .swap_reviewer(&"pr-1".into(), &"u4".into(), &"u3".into())
            .await
            .is_err());

        repo.mark_merged(&"pr-1".into(), t(2)).await.unwrap();
        assert!(repo
            .swap_reviewer(&"pr-1".into(), &"u4".into(), &"u5".into())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_list_by_reviewer_newest_first() {
        let repo = InMemoryRepository::new();
        repo.create(&pr("old", &["u2"], 1)).await.unwrap();
        repo.create(&pr("new", &["u2", "u3"], 5)).await.unwrap();
        repo.create(&pr("other", &["u3"], 3)).await.unwrap();

        let ids: Vec<String> = repo
            .list_by_reviewer(&"u2".into())
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id.0)
            .collect();
        assert_eq!(ids, vec!["new", "old"]);

        assert_eq!(repo.list_all().await.unwrap().len(), 3);
    }
}
