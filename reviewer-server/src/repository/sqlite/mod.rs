//! SQLite implementation of the repository traits.
//!
//! This provides persistent storage that survives service restarts.
//!
//! # Schema Versioning
//!
//! The database has a `schema_version` table that tracks the schema version.
//! When the schema needs to change, increment `CURRENT_SCHEMA_VERSION` and add
//! a migration in `run_migrations()`. Migrations run sequentially from the
//! current version to the target version.
//!
//! # Timestamps
//!
//! Timestamps are stored as RFC 3339 text with microsecond precision and a
//! `Z` suffix. The fixed width makes lexical order equal chronological order,
//! so `ORDER BY created_at` works on the text column.

mod pull_requests;
mod teams;

#[cfg(test)]
mod tests;

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::warn;

use reviewer_core::{PullRequest, PullRequestId, Team, TeamName, User, UserId};

use super::{PullRequestRepository, RepositoryError, UserTeamRepository};

/// Current schema version. Increment this when making schema changes and add
/// corresponding migration logic in `run_migrations()`.
const CURRENT_SCHEMA_VERSION: i64 = 1;

/// SQLite-backed repository.
///
/// Uses `tokio::task::spawn_blocking` to run synchronous rusqlite operations
/// without blocking the async runtime. The connection mutex serializes
/// statements from this process; write transactions are `IMMEDIATE` so that
/// other processes sharing the file wait rather than interleave.
pub struct SqliteRepository {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

impl SqliteRepository {
    /// Create a new SQLite repository at the given path.
    ///
    /// Creates the database file and schema if they don't exist.
    /// Runs any pending migrations if the database exists but has an older schema.
    ///
    /// # Durability
    ///
    /// The database is configured with:
    /// - `journal_mode = WAL` for better concurrency and crash safety
    /// - `synchronous = FULL` so a committed write survives power loss
    /// - `busy_timeout = 5000ms` to handle concurrent access gracefully
    /// - `foreign_keys = ON`
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, RepositoryError> {
        let path_ref = path.as_ref();

        let path_str = path_ref.to_string_lossy();
        let is_in_memory = path_str == ":memory:";
        if !is_in_memory && !path_str.is_empty() {
            if let Some(parent) = path_ref.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        RepositoryError::storage(
                            "create database directory",
                            format!("{}: {}", parent.display(), e),
                        )
                    })?;
                }
            }
        }

        let conn = Connection::open(path_ref)
            .map_err(|e| RepositoryError::storage("open database", e.to_string()))?;

        #[cfg(unix)]
        if !is_in_memory && !path_str.is_empty() {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o600);
            if let Err(e) = std::fs::set_permissions(path_ref, permissions) {
                warn!(
                    "Failed to set restrictive permissions on database file: {}",
                    e
                );
            }
        }

        // SQLite silently keeps DELETE mode on filesystems without shared
        // memory support. In-memory databases report "memory".
        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
            .map_err(|e| RepositoryError::storage("set journal_mode", e.to_string()))?;

        let journal_mode_ok = journal_mode.eq_ignore_ascii_case("wal")
            || (is_in_memory && journal_mode.eq_ignore_ascii_case("memory"));

        if !journal_mode_ok {
            return Err(RepositoryError::storage(
                "configure journal_mode",
                format!(
                    "Failed to enable WAL mode: SQLite returned '{}' instead of 'wal'. \
                     The database requires WAL mode for durability and concurrency guarantees.",
                    journal_mode
                ),
            ));
        }

        conn.execute_batch(
            r#"
            PRAGMA synchronous = FULL;
            PRAGMA busy_timeout = 5000;
            PRAGMA foreign_keys = ON;
            "#,
        )
        .map_err(|e| RepositoryError::storage("configure pragmas", e.to_string()))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                version INTEGER NOT NULL
            );
            "#,
        )
        .map_err(|e| RepositoryError::storage("create schema_version table", e.to_string()))?;

        // 0 if the table is empty (fresh database)
        let current_version: i64 = conn
            .query_row(
                "SELECT version FROM schema_version WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| RepositoryError::storage("get schema version", e.to_string()))?
            .unwrap_or(0);

        Self::run_migrations(&conn, current_version)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run migrations from `from_version` to `CURRENT_SCHEMA_VERSION`.
    fn run_migrations(conn: &Connection, from_version: i64) -> Result<(), RepositoryError> {
        if from_version > CURRENT_SCHEMA_VERSION {
            return Err(RepositoryError::storage(
                "schema version",
                format!(
                    "Database schema version {} is newer than supported version {}. \
                     Please upgrade the application.",
                    from_version, CURRENT_SCHEMA_VERSION
                ),
            ));
        }

        if from_version == CURRENT_SCHEMA_VERSION {
            return Ok(());
        }

        if from_version < 1 {
            conn.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS teams (
                    name TEXT PRIMARY KEY
                );

                CREATE TABLE IF NOT EXISTS users (
                    user_id TEXT PRIMARY KEY,
                    username TEXT NOT NULL,
                    team_name TEXT NOT NULL REFERENCES teams(name),
                    is_active INTEGER NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_users_team ON users(team_name);

                CREATE TABLE IF NOT EXISTS pull_requests (
                    pr_id TEXT PRIMARY KEY,
                    pr_name TEXT NOT NULL,
                    author_id TEXT NOT NULL,
                    status TEXT NOT NULL CHECK (status IN ('OPEN', 'MERGED')),
                    created_at TEXT NOT NULL,
                    merged_at TEXT,
                    CHECK ((status = 'MERGED') = (merged_at IS NOT NULL))
                );

                CREATE INDEX IF NOT EXISTS idx_pull_requests_created
                    ON pull_requests(created_at DESC);

                CREATE TABLE IF NOT EXISTS pull_request_reviewers (
                    pr_id TEXT NOT NULL REFERENCES pull_requests(pr_id),
                    slot INTEGER NOT NULL,
                    reviewer_id TEXT NOT NULL,
                    PRIMARY KEY (pr_id, slot),
                    UNIQUE (pr_id, reviewer_id)
                );

                CREATE INDEX IF NOT EXISTS idx_reviewers_by_reviewer
                    ON pull_request_reviewers(reviewer_id);
                "#,
            )
            .map_err(|e| RepositoryError::storage("migration v1", e.to_string()))?;
        }

        conn.execute(
            "INSERT OR REPLACE INTO schema_version (id, version) VALUES (1, ?1)",
            params![CURRENT_SCHEMA_VERSION],
        )
        .map_err(|e| RepositoryError::storage("update schema version", e.to_string()))?;

        Ok(())
    }

    /// Create a new in-memory SQLite repository (for testing).
    pub fn new_in_memory() -> Result<Self, RepositoryError> {
        Self::new(":memory:")
    }

    /// Run `f` against the connection on the blocking thread pool.
    pub(super) async fn with_conn<T, F>(
        &self,
        operation: &'static str,
        f: F,
    ) -> Result<T, RepositoryError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, RepositoryError> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|_| RepositoryError::storage(operation, "connection mutex poisoned"))?;
            f(&mut *conn)
        })
        .await
        .map_err(|e| RepositoryError::storage(operation, e.to_string()))?
    }
}

// =============================================================================
// Conversion helpers
// =============================================================================

pub(super) fn storage_err(operation: &'static str) -> impl Fn(rusqlite::Error) -> RepositoryError {
    move |e| RepositoryError::storage(operation, e.to_string())
}

/// True if the statement failed on a PRIMARY KEY, UNIQUE, or CHECK constraint.
pub(super) fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _) if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

pub(super) fn timestamp_to_text(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(super) fn text_to_timestamp(text: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(text)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|_| RepositoryError::corruption(format!("timestamp '{}'", text)))
}

/// Convert a reviewer slot index to the stored integer.
pub(super) fn slot_to_i64(slot: usize) -> Result<i64, RepositoryError> {
    i64::try_from(slot)
        .map_err(|_| RepositoryError::storage("reviewer slot", format!("slot {} too large", slot)))
}

// =============================================================================
// Trait implementations
// =============================================================================

#[async_trait]
impl UserTeamRepository for SqliteRepository {
    async fn get_user(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        self.get_user_impl(id).await
    }

    async fn get_team(&self, name: &TeamName) -> Result<Option<Team>, RepositoryError> {
        self.get_team_impl(name).await
    }

    async fn upsert_team(&self, team: &Team) -> Result<Team, RepositoryError> {
        self.upsert_team_impl(team).await
    }

    async fn set_user_active(
        &self,
        id: &UserId,
        is_active: bool,
    ) -> Result<Option<User>, RepositoryError> {
        self.set_user_active_impl(id, is_active).await
    }

    async fn deactivate_team(&self, name: &TeamName) -> Result<Option<usize>, RepositoryError> {
        self.deactivate_team_impl(name).await
    }
}

#[async_trait]
impl PullRequestRepository for SqliteRepository {
    async fn create(&self, pr: &PullRequest) -> Result<(), RepositoryError> {
        self.create_pr_impl(pr).await
    }

    async fn get(&self, id: &PullRequestId) -> Result<Option<PullRequest>, RepositoryError> {
        self.get_pr_impl(id).await
    }

    async fn mark_merged(
        &self,
        id: &PullRequestId,
        merged_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        self.mark_merged_impl(id, merged_at).await
    }

    async fn swap_reviewer(
        &self,
        id: &PullRequestId,
        old_reviewer: &UserId,
        new_reviewer: &UserId,
    ) -> Result<(), RepositoryError> {
        self.swap_reviewer_impl(id, old_reviewer, new_reviewer)
            .await
    }

    async fn list_by_reviewer(
        &self,
        reviewer: &UserId,
    ) -> Result<Vec<PullRequest>, RepositoryError> {
        self.list_by_reviewer_impl(reviewer).await
    }

    async fn list_all(&self) -> Result<Vec<PullRequest>, RepositoryError> {
        self.list_all_impl().await
    }
}
