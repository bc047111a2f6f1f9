use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{is_constraint_violation, ForumError, ForumResult};
use crate::db::models::User;

const TAKEN: &str = "Username already taken.";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        created_at: row.get(3)?,
    })
}

/// Insert a user. The caller hashes the password; this layer never sees
/// plaintext credentials.
pub fn create_user(conn: &Connection, username: &str, password_hash: &str) -> ForumResult<i64> {
    if find_by_username(conn, username)?.is_some() {
        return Err(ForumError::Conflict(TAKEN.into()));
    }

    match conn.execute(
        "INSERT INTO users (username, password_hash, created_at) VALUES (?1, ?2, ?3)",
        params![username, password_hash, Utc::now()],
    ) {
        Ok(_) => {}
        // Lost a race with a concurrent registration of the same name
        Err(e) if is_constraint_violation(&e) => return Err(ForumError::Conflict(TAKEN.into())),
        Err(e) => return Err(e.into()),
    }

    let id = conn.last_insert_rowid();
    tracing::info!(user_id = id, username, "Registered user");
    Ok(id)
}

pub fn find_by_username(conn: &Connection, username: &str) -> ForumResult<Option<User>> {
    Ok(conn
        .query_row(
            "SELECT id, username, password_hash, created_at FROM users WHERE username = ?1",
            params![username],
            user_from_row,
        )
        .optional()?)
}

pub fn find_by_id(conn: &Connection, id: i64) -> ForumResult<Option<User>> {
    Ok(conn
        .query_row(
            "SELECT id, username, password_hash, created_at FROM users WHERE id = ?1",
            params![id],
            user_from_row,
        )
        .optional()?)
}
