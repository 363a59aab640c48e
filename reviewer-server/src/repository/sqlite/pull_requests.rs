//! Pull request operations for the SQLite repository.
//!
//! A pull request is one row in `pull_requests` plus one row per reviewer in
//! `pull_request_reviewers`, keyed by slot so that reassignment keeps the
//! reviewer's position.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use reviewer_core::{PrStatus, PullRequest, PullRequestId, UserId};

use super::super::RepositoryError;
use super::{
    is_constraint_violation, slot_to_i64, storage_err, text_to_timestamp, timestamp_to_text,
    SqliteRepository,
};

const PR_COLUMNS: &str = "pr_id, pr_name, author_id, status, created_at, merged_at";

/// Raw `pull_requests` row before decoding.
struct PrRow {
    id: String,
    name: String,
    author_id: String,
    status: String,
    created_at: String,
    merged_at: Option<String>,
}

fn read_pr_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PrRow> {
    Ok(PrRow {
        id: row.get(0)?,
        name: row.get(1)?,
        author_id: row.get(2)?,
        status: row.get(3)?,
        created_at: row.get(4)?,
        merged_at: row.get(5)?,
    })
}

fn load_reviewers(conn: &Connection, pr_id: &str) -> Result<Vec<UserId>, RepositoryError> {
    let mut stmt = conn
        .prepare(
            "SELECT reviewer_id FROM pull_request_reviewers
             WHERE pr_id = ?1 ORDER BY slot",
        )
        .map_err(storage_err("load reviewers"))?;
    let reviewers = stmt
        .query_map(params![pr_id], |row| row.get::<_, String>(0))
        .map_err(storage_err("load reviewers"))?
        .map(|r| r.map(UserId))
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(storage_err("load reviewers"))?;
    Ok(reviewers)
}

fn decode(conn: &Connection, row: PrRow) -> Result<PullRequest, RepositoryError> {
    let status = PrStatus::parse(&row.status).ok_or_else(|| {
        RepositoryError::corruption(format!("status '{}' of pull request {}", row.status, row.id))
    })?;
    let created_at = text_to_timestamp(&row.created_at)?;
    let merged_at = row
        .merged_at
        .as_deref()
        .map(text_to_timestamp)
        .transpose()?;
    let reviewers = load_reviewers(conn, &row.id)?;

    Ok(PullRequest {
        id: PullRequestId(row.id),
        name: row.name,
        author_id: UserId(row.author_id),
        status,
        reviewers,
        created_at,
        merged_at,
    })
}

fn load_pr(conn: &Connection, id: &str) -> Result<Option<PullRequest>, RepositoryError> {
    let row = conn
        .query_row(
            &format!("SELECT {} FROM pull_requests WHERE pr_id = ?1", PR_COLUMNS),
            params![id],
            read_pr_row,
        )
        .optional()
        .map_err(storage_err("get pull request"))?;

    row.map(|row| decode(conn, row)).transpose()
}

fn load_many(
    conn: &Connection,
    sql: &str,
    args: &[&dyn rusqlite::ToSql],
    operation: &'static str,
) -> Result<Vec<PullRequest>, RepositoryError> {
    let mut stmt = conn.prepare(sql).map_err(storage_err(operation))?;
    let rows = stmt
        .query_map(args, read_pr_row)
        .map_err(storage_err(operation))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(storage_err(operation))?;

    rows.into_iter().map(|row| decode(conn, row)).collect()
}

impl SqliteRepository {
    pub(super) async fn create_pr_impl(&self, pr: &PullRequest) -> Result<(), RepositoryError> {
        let pr = pr.clone();
        self.with_conn("create pull request", move |conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(storage_err("create pull request begin"))?;

            let inserted = tx.execute(
                "INSERT INTO pull_requests (pr_id, pr_name, author_id, status, created_at, merged_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    pr.id.0,
                    pr.name,
                    pr.author_id.0,
                    pr.status.as_str(),
                    timestamp_to_text(&pr.created_at),
                    pr.merged_at.as_ref().map(timestamp_to_text),
                ],
            );
            match inserted {
                Ok(_) => {}
                Err(e) if is_constraint_violation(&e) => {
                    return Err(RepositoryError::conflict(format!(
                        "pull request {} already exists",
                        pr.id
                    )));
                }
                Err(e) => {
                    return Err(RepositoryError::storage(
                        "create pull request",
                        e.to_string(),
                    ))
                }
            }

            {
                let mut insert_reviewer = tx
                    .prepare(
                        "INSERT INTO pull_request_reviewers (pr_id, slot, reviewer_id)
                         VALUES (?1, ?2, ?3)",
                    )
                    .map_err(storage_err("create pull request reviewers"))?;
                for (slot, reviewer) in pr.reviewers.iter().enumerate() {
                    insert_reviewer
                        .execute(params![pr.id.0, slot_to_i64(slot)?, reviewer.0])
                        .map_err(storage_err("create pull request reviewers"))?;
                }
            }

            tx.commit()
                .map_err(storage_err("create pull request commit"))?;
            Ok(())
        })
        .await
    }

    pub(super) async fn get_pr_impl(
        &self,
        id: &PullRequestId,
    ) -> Result<Option<PullRequest>, RepositoryError> {
        let id = id.0.clone();
        self.with_conn("get pull request", move |conn| load_pr(conn, &id))
            .await
    }

    pub(super) async fn mark_merged_impl(
        &self,
        id: &PullRequestId,
        merged_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let id = id.0.clone();
        let merged_at = timestamp_to_text(&merged_at);
        self.with_conn("mark merged", move |conn| {
            let updated = conn
                .execute(
                    "UPDATE pull_requests SET status = 'MERGED', merged_at = ?2
                     WHERE pr_id = ?1 AND status = 'OPEN'",
                    params![id, merged_at],
                )
                .map_err(storage_err("mark merged"))?;
            if updated == 0 {
                return Err(RepositoryError::conflict(format!(
                    "pull request {} is missing or not open",
                    id
                )));
            }
            Ok(())
        })
        .await
    }

    pub(super) async fn swap_reviewer_impl(
        &self,
        id: &PullRequestId,
        old_reviewer: &UserId,
        new_reviewer: &UserId,
    ) -> Result<(), RepositoryError> {
        let id = id.0.clone();
        let old_reviewer = old_reviewer.0.clone();
        let new_reviewer = new_reviewer.0.clone();
        self.with_conn("swap reviewer", move |conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(storage_err("swap reviewer begin"))?;

            let status: Option<String> = tx
                .query_row(
                    "SELECT status FROM pull_requests WHERE pr_id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(storage_err("swap reviewer"))?;
            if status.as_deref() != Some(PrStatus::Open.as_str()) {
                return Err(RepositoryError::conflict(format!(
                    "pull request {} is missing or not open",
                    id
                )));
            }

            let updated = tx.execute(
                "UPDATE pull_request_reviewers SET reviewer_id = ?3
                 WHERE pr_id = ?1 AND reviewer_id = ?2",
                params![id, old_reviewer, new_reviewer],
            );
            match updated {
                Ok(1) => {}
                Ok(_) => {
                    return Err(RepositoryError::conflict(format!(
                        "{} no longer reviews pull request {}",
                        old_reviewer, id
                    )));
                }
                Err(e) if is_constraint_violation(&e) => {
                    return Err(RepositoryError::conflict(format!(
                        "{} already reviews pull request {}",
                        new_reviewer, id
                    )));
                }
                Err(e) => return Err(RepositoryError::storage("swap reviewer", e.to_string())),
            }

            tx.commit().map_err(storage_err("swap reviewer commit"))?;
            Ok(())
        })
        .await
    }

    pub(super) async fn list_by_reviewer_impl(
        &self,
        reviewer: &UserId,
    ) -> Result<Vec<PullRequest>, RepositoryError> {
        let reviewer = reviewer.0.clone();
        self.with_conn("list by reviewer", move |conn| {
            let sql = "SELECT pr.pr_id, pr.pr_name, pr.author_id, pr.status, pr.created_at, pr.merged_at
                       FROM pull_requests pr
                       INNER JOIN pull_request_reviewers prr ON pr.pr_id = prr.pr_id
                       WHERE prr.reviewer_id = ?1
                       ORDER BY pr.created_at DESC, pr.pr_id ASC";
            load_many(conn, sql, params![reviewer], "list by reviewer")
        })
        .await
    }

    pub(super) async fn list_all_impl(&self) -> Result<Vec<PullRequest>, RepositoryError> {
        self.with_conn("list pull requests", move |conn| {
            let sql = format!(
                "SELECT {} FROM pull_requests ORDER BY created_at DESC, pr_id ASC",
                PR_COLUMNS
            );
            load_many(conn, &sql, params![], "list pull requests")
        })
        .await
    }
}
