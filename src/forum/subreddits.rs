use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{is_constraint_violation, validate, ForumError, ForumResult};
use crate::db::models::Subreddit;

const TAKEN: &str = "Subreddit name already exists.";

const COLUMNS: &str = "id, name, description, creator_id, created_at";

fn subreddit_from_row(row: &Row<'_>) -> rusqlite::Result<Subreddit> {
    Ok(Subreddit {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        creator_id: row.get(3)?,
        created_at: row.get(4)?,
    })
}

pub fn create_subreddit(
    conn: &Connection,
    creator_id: i64,
    name: &str,
    description: &str,
) -> ForumResult<i64> {
    validate::subreddit_name(name)?;
    if find_by_name(conn, name)?.is_some() {
        return Err(ForumError::Conflict(TAKEN.into()));
    }

    match conn.execute(
        "INSERT INTO subreddits (name, description, creator_id, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![name, description, creator_id, Utc::now()],
    ) {
        Ok(_) => {}
        Err(e) if is_constraint_violation(&e) => return Err(ForumError::Conflict(TAKEN.into())),
        Err(e) => return Err(e.into()),
    }

    let id = conn.last_insert_rowid();
    tracing::info!(subreddit_id = id, name, creator_id, "Created subreddit");
    Ok(id)
}

pub fn find_by_name(conn: &Connection, name: &str) -> ForumResult<Option<Subreddit>> {
    Ok(conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM subreddits WHERE name = ?1"),
            params![name],
            subreddit_from_row,
        )
        .optional()?)
}

pub fn find_by_id(conn: &Connection, id: i64) -> ForumResult<Option<Subreddit>> {
    Ok(conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM subreddits WHERE id = ?1"),
            params![id],
            subreddit_from_row,
        )
        .optional()?)
}

/// All subreddits alphabetically, for the new-post picker.
pub fn list_by_name(conn: &Connection) -> ForumResult<Vec<Subreddit>> {
    let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM subreddits ORDER BY name"))?;
    let rows = stmt
        .query_map([], subreddit_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
