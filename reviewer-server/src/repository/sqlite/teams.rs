//! Team and user operations for the SQLite repository.

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use reviewer_core::{Team, TeamName, User, UserId};

use super::super::RepositoryError;
use super::{storage_err, SqliteRepository};

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: UserId(row.get(0)?),
        username: row.get(1)?,
        team_name: TeamName(row.get(2)?),
        is_active: row.get(3)?,
    })
}

fn load_user(conn: &Connection, id: &str) -> Result<Option<User>, RepositoryError> {
    conn.query_row(
        "SELECT user_id, username, team_name, is_active FROM users WHERE user_id = ?1",
        params![id],
        row_to_user,
    )
    .optional()
    .map_err(storage_err("get_user"))
}

/// Load a team with its members in join order, or None if the team row is missing.
fn load_team(conn: &Connection, name: &str) -> Result<Option<Team>, RepositoryError> {
    let exists = conn
        .query_row("SELECT 1 FROM teams WHERE name = ?1", params![name], |_| Ok(()))
        .optional()
        .map_err(storage_err("get_team"))?
        .is_some();
    if !exists {
        return Ok(None);
    }

    let mut stmt = conn
        .prepare(
            "SELECT user_id, username, team_name, is_active FROM users
             WHERE team_name = ?1 ORDER BY rowid",
        )
        .map_err(storage_err("get_team"))?;
    let members = stmt
        .query_map(params![name], row_to_user)
        .map_err(storage_err("get_team"))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(storage_err("get_team"))?;

    Ok(Some(Team {
        name: TeamName::from(name),
        members,
    }))
}

impl SqliteRepository {
    pub(super) async fn get_user_impl(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let id = id.0.clone();
        self.with_conn("get_user", move |conn| load_user(conn, &id))
            .await
    }

    pub(super) async fn get_team_impl(
        &self,
        name: &TeamName,
    ) -> Result<Option<Team>, RepositoryError> {
        let name = name.0.clone();
        self.with_conn("get_team", move |conn| load_team(conn, &name))
            .await
    }

    pub(super) async fn upsert_team_impl(&self, team: &Team) -> Result<Team, RepositoryError> {
        let team = team.clone();
        self.with_conn("upsert_team", move |conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(storage_err("upsert_team begin"))?;

            tx.execute(
                "INSERT OR IGNORE INTO teams (name) VALUES (?1)",
                params![team.name.0],
            )
            .map_err(storage_err("upsert_team insert team"))?;

            {
                let mut insert_user = tx
                    .prepare(
                        "INSERT INTO users (user_id, username, team_name, is_active)
                         VALUES (?1, ?2, ?3, ?4)
                         ON CONFLICT(user_id) DO NOTHING",
                    )
                    .map_err(storage_err("upsert_team insert users"))?;
                for member in &team.members {
                    insert_user
                        .execute(params![
                            member.id.0,
                            member.username,
                            team.name.0,
                            member.is_active
                        ])
                        .map_err(storage_err("upsert_team insert users"))?;
                }
            }

            let stored = load_team(&tx, &team.name.0)?.ok_or_else(|| {
                RepositoryError::storage("upsert_team", "team missing after insert")
            })?;

            tx.commit().map_err(storage_err("upsert_team commit"))?;
            Ok(stored)
        })
        .await
    }

    pub(super) async fn set_user_active_impl(
        &self,
        id: &UserId,
        is_active: bool,
    ) -> Result<Option<User>, RepositoryError> {
        let id = id.0.clone();
        self.with_conn("set_user_active", move |conn| {
            let updated = conn
                .execute(
                    "UPDATE users SET is_active = ?2 WHERE user_id = ?1",
                    params![id, is_active],
                )
                .map_err(storage_err("set_user_active"))?;
            if updated == 0 {
                return Ok(None);
            }
            load_user(conn, &id)
        })
        .await
    }

    pub(super) async fn deactivate_team_impl(
        &self,
        name: &TeamName,
    ) -> Result<Option<usize>, RepositoryError> {
        let name = name.0.clone();
        self.with_conn("deactivate_team", move |conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(storage_err("deactivate_team begin"))?;

            let exists = tx
                .query_row("SELECT 1 FROM teams WHERE name = ?1", params![name], |_| Ok(()))
                .optional()
                .map_err(storage_err("deactivate_team"))?
                .is_some();
            if !exists {
                return Ok(None);
            }

            let changed = tx
                .execute(
                    "UPDATE users SET is_active = 0 WHERE team_name = ?1 AND is_active = 1",
                    params![name],
                )
                .map_err(storage_err("deactivate_team"))?;

            tx.commit().map_err(storage_err("deactivate_team commit"))?;
            Ok(Some(changed))
        })
        .await
    }
}
