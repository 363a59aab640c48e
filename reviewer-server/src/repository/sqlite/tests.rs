//! Tests for SQLite repository implementation.

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::params;

use reviewer_core::{PrStatus, PullRequest, Team, TeamName, User, UserId};

use super::super::{PullRequestRepository, RepositoryError, UserTeamRepository};
use super::{SqliteRepository, CURRENT_SCHEMA_VERSION};

use proptest::prelude::*;

fn t(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

fn user(id: &str, active: bool) -> User {
    User::new(id, format!("name-{}", id), active, "")
}

fn open_pr(id: &str, reviewers: &[&str], created: DateTime<Utc>) -> PullRequest {
    PullRequest {
        id: id.into(),
        name: format!("PR {}", id),
        author_id: "u1".into(),
        status: PrStatus::Open,
        reviewers: reviewers.iter().map(|r| UserId::from(*r)).collect(),
        created_at: created,
        merged_at: None,
    }
}

async fn seeded_repo() -> SqliteRepository {
    let repo = SqliteRepository::new_in_memory().unwrap();
    repo.upsert_team(&Team::new(
        "qa",
        vec![
            user("u1", true),
            user("u2", true),
            user("u3", true),
            user("u4", false),
        ],
    ))
    .await
    .unwrap();
    repo
}

// =========================================================================
// Schema
// =========================================================================

#[test]
fn test_fresh_database_records_schema_version() {
    let repo = SqliteRepository::new_in_memory().unwrap();
    let conn = repo.conn.lock().unwrap();
    let version: i64 = conn
        .query_row("SELECT version FROM schema_version WHERE id = 1", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(version, CURRENT_SCHEMA_VERSION);
}

#[test]
fn test_newer_schema_version_is_rejected() {
    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("future.db");

    {
        let repo = SqliteRepository::new(&db_path).unwrap();
        let conn = repo.conn.lock().unwrap();
        conn.execute(
            "UPDATE schema_version SET version = ?1 WHERE id = 1",
            params![CURRENT_SCHEMA_VERSION + 1],
        )
        .unwrap();
    }

    let err = SqliteRepository::new(&db_path).err().unwrap();
    assert!(matches!(err, RepositoryError::Storage { .. }));
}

#[test]
fn test_creates_missing_parent_directory() {
    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("nested").join("state.db");

    SqliteRepository::new(&db_path).unwrap();
    assert!(db_path.exists());
}

// =========================================================================
// Teams and users
// =========================================================================

#[tokio::test]
async fn test_get_missing_team_and_user() {
    let repo = SqliteRepository::new_in_memory().unwrap();
    assert!(repo.get_team(&"nope".into()).await.unwrap().is_none());
    assert!(repo.get_user(&"nope".into()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_upsert_team_keeps_member_order() {
    let repo = seeded_repo().await;

    let team = repo.get_team(&"qa".into()).await.unwrap().unwrap();
    let ids: Vec<&str> = team.members.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["u1", "u2", "u3", "u4"]);
    assert!(team.members.iter().all(|m| m.team_name == TeamName::from("qa")));
    assert!(!team.member(&"u4".into()).unwrap().is_active);
}

#[tokio::test]
async fn test_upsert_team_leaves_existing_users_alone() {
    let repo = seeded_repo().await;

    let stored = repo
        .upsert_team(&Team::new("backend", vec![user("u2", false), user("u9", true)]))
        .await
        .unwrap();

    let ids: Vec<&str> = stored.members.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["u9"]);

    let u2 = repo.get_user(&"u2".into()).await.unwrap().unwrap();
    assert_eq!(u2.team_name, TeamName::from("qa"));
    assert!(u2.is_active);
}

#[tokio::test]
async fn test_set_user_active() {
    let repo = seeded_repo().await;

    let updated = repo
        .set_user_active(&"u4".into(), true)
        .await
        .unwrap()
        .unwrap();
    assert!(updated.is_active);
    assert!(repo
        .set_user_active(&"ghost".into(), true)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_deactivate_team_counts_only_active_members() {
    let repo = seeded_repo().await;

    assert_eq!(repo.deactivate_team(&"qa".into()).await.unwrap(), Some(3));
    assert_eq!(repo.deactivate_team(&"qa".into()).await.unwrap(), Some(0));
    assert_eq!(repo.deactivate_team(&"nope".into()).await.unwrap(), None);

    let team = repo.get_team(&"qa".into()).await.unwrap().unwrap();
    assert!(team.members.iter().all(|m| !m.is_active));
}

// =========================================================================
// Pull requests
// =========================================================================

#[tokio::test]
async fn test_create_then_get() {
    let repo = seeded_repo().await;
    let pr = open_pr("pr-1", &["u3", "u2"], t(100));

    repo.create(&pr).await.unwrap();
    let stored = repo.get(&"pr-1".into()).await.unwrap().unwrap();
    assert_eq!(stored, pr);
    assert!(repo.get(&"pr-2".into()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_create_duplicate_is_conflict_and_keeps_original() {
    let repo = seeded_repo().await;
    repo.create(&open_pr("pr-1", &["u2"], t(1))).await.unwrap();

    let err = repo
        .create(&open_pr("pr-1", &["u3"], t(2)))
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::Conflict { .. }));

    let stored = repo.get(&"pr-1".into()).await.unwrap().unwrap();
    assert_eq!(stored.reviewers, vec![UserId::from("u2")]);
    assert_eq!(stored.created_at, t(1));
}

#[tokio::test]
async fn test_create_with_duplicate_reviewer_rolls_back() {
    let repo = seeded_repo().await;

    let err = repo
        .create(&open_pr("pr-1", &["u2", "u2"], t(1)))
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::Storage { .. }));
    assert!(repo.get(&"pr-1".into()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_mark_merged_is_compare_and_swap() {
    let repo = seeded_repo().await;
    repo.create(&open_pr("pr-1", &["u2"], t(1))).await.unwrap();

    repo.mark_merged(&"pr-1".into(), t(5)).await.unwrap();
    let err = repo.mark_merged(&"pr-1".into(), t(9)).await.unwrap_err();
    assert!(matches!(err, RepositoryError::Conflict { .. }));

    let stored = repo.get(&"pr-1".into()).await.unwrap().unwrap();
    assert_eq!(stored.status, PrStatus::Merged);
    assert_eq!(stored.merged_at, Some(t(5)));

    let err = repo.mark_merged(&"missing".into(), t(5)).await.unwrap_err();
    assert!(matches!(err, RepositoryError::Conflict { .. }));
}

#[tokio::test]
async fn test_swap_reviewer_keeps_slot() {
    let repo = seeded_repo().await;
    repo.create(&open_pr("pr-1", &["u2", "u3"], t(1)))
        .await
        .unwrap();

    repo.swap_reviewer(&"pr-1".into(), &"u2".into(), &"u4".into())
        .await
        .unwrap();

    let stored = repo.get(&"pr-1".into()).await.unwrap().unwrap();
    assert_eq!(stored.reviewers, vec![UserId::from("u4"), UserId::from("u3")]);
}

#[tokio::test]
async fn test_swap_reviewer_guards() {
    let repo = seeded_repo().await;
    repo.create(&open_pr("pr-1", &["u2", "u3"], t(1)))
        .await
        .unwrap();

    // Old reviewer not assigned.
    let err = repo
        .swap_reviewer(&"pr-1".into(), &"u9".into(), &"u4".into())
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::Conflict { .. }));

    // New reviewer already assigned.
    let err = repo
        .swap_reviewer(&"pr-1".into(), &"u2".into(), &"u3".into())
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::Conflict { .. }));

    // Merged.
    repo.mark_merged(&"pr-1".into(), t(2)).await.unwrap();
    let err = repo
        .swap_reviewer(&"pr-1".into(), &"u2".into(), &"u4".into())
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::Conflict { .. }));

    let stored = repo.get(&"pr-1".into()).await.unwrap().unwrap();
    assert_eq!(stored.reviewers, vec![UserId::from("u2"), UserId::from("u3")]);
}

#[tokio::test]
async fn test_list_by_reviewer_newest_first() {
    let repo = seeded_repo().await;
    repo.create(&open_pr("old", &["u2"], t(1))).await.unwrap();
    repo.create(&open_pr("new", &["u3", "u2"], t(5)))
        .await
        .unwrap();
    repo.create(&open_pr("other", &["u3"], t(3))).await.unwrap();

    let ids: Vec<String> = repo
        .list_by_reviewer(&"u2".into())
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.id.0)
        .collect();
    assert_eq!(ids, vec!["new", "old"]);

    let all: Vec<String> = repo
        .list_all()
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.id.0)
        .collect();
    assert_eq!(all, vec!["new", "other", "old"]);
}

#[tokio::test]
async fn test_corrupt_timestamp_is_reported() {
    let repo = seeded_repo().await;
    repo.create(&open_pr("pr-1", &[], t(1))).await.unwrap();
    {
        let conn = repo.conn.lock().unwrap();
        conn.execute(
            "UPDATE pull_requests SET created_at = 'yesterday' WHERE pr_id = 'pr-1'",
            [],
        )
        .unwrap();
    }

    let err = repo.get(&"pr-1".into()).await.unwrap_err();
    assert!(matches!(err, RepositoryError::Corruption { .. }));
}

// =========================================================================
// On-disk persistence tests
// =========================================================================

#[tokio::test]
async fn test_on_disk_persistence_basic() {
    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("test.db");

    {
        let repo = SqliteRepository::new(&db_path).unwrap();
        repo.upsert_team(&Team::new("qa", vec![user("u1", true), user("u2", true)]))
            .await
            .unwrap();
        repo.create(&open_pr("pr-1", &["u2"], t(10))).await.unwrap();
        repo.mark_merged(&"pr-1".into(), t(20)).await.unwrap();
        // repo is dropped here
    }

    let repo = SqliteRepository::new(&db_path).unwrap();
    let team = repo.get_team(&"qa".into()).await.unwrap().unwrap();
    assert_eq!(team.members.len(), 2);

    let pr = repo.get(&"pr-1".into()).await.unwrap().unwrap();
    assert_eq!(pr.status, PrStatus::Merged);
    assert_eq!(pr.merged_at, Some(t(20)));
    assert_eq!(pr.reviewers, vec![UserId::from("u2")]);
}

fn arb_timestamp() -> impl Strategy<Value = DateTime<Utc>> {
    // Whole microseconds, which is what the text column keeps.
    (0i64..4_000_000_000, 0u32..1_000_000)
        .prop_map(|(secs, micros)| Utc.timestamp_opt(secs, micros * 1_000).unwrap())
}

fn arb_pull_request() -> impl Strategy<Value = PullRequest> {
    (
        "[a-z0-9-]{1,20}",
        "[a-zA-Z0-9 ]{0,40}",
        proptest::sample::subsequence(vec!["u2", "u3", "u4", "u5"], 0..=2),
        arb_timestamp(),
        proptest::option::of(arb_timestamp()),
    )
        .prop_map(|(id, name, reviewers, created_at, merged_at)| PullRequest {
            id: id.into(),
            name,
            author_id: "u1".into(),
            status: if merged_at.is_some() {
                PrStatus::Merged
            } else {
                PrStatus::Open
            },
            reviewers: reviewers.into_iter().map(UserId::from).collect(),
            created_at,
            merged_at,
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: a stored pull request survives close and reopen unchanged.
    #[test]
    fn on_disk_persistence_survives_reopen(pr in arb_pull_request()) {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        rt.block_on(async {
            let temp_dir = tempfile::tempdir().unwrap();
            let db_path = temp_dir.path().join("test.db");

            {
                let repo = SqliteRepository::new(&db_path).unwrap();
                repo.create(&pr).await.unwrap();
            }

            let repo = SqliteRepository::new(&db_path).unwrap();
            let retrieved = repo.get(&pr.id).await.unwrap();
            assert_eq!(
                retrieved.as_ref(),
                Some(&pr),
                "pull request changed after database close/reopen"
            );
        });
    }
}
