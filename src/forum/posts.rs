use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{ForumError, ForumResult};
use crate::db::models::PostSummary;

const SUMMARY_SELECT: &str = "
    SELECT p.id, p.title, p.body, p.created_at,
           p.author_id, u.username,
           p.subreddit_id, s.name,
           (SELECT COALESCE(SUM(v.value), 0) FROM votes v WHERE v.post_id = p.id),
           (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id)
    FROM posts p
    JOIN users u ON u.id = p.author_id
    JOIN subreddits s ON s.id = p.subreddit_id";

fn summary_from_row(row: &Row<'_>) -> rusqlite::Result<PostSummary> {
    Ok(PostSummary {
        id: row.get(0)?,
        title: row.get(1)?,
        body: row.get(2)?,
        created_at: row.get(3)?,
        author_id: row.get(4)?,
        author: row.get(5)?,
        subreddit_id: row.get(6)?,
        subreddit: row.get(7)?,
        score: row.get(8)?,
        comment_count: row.get(9)?,
    })
}

pub fn create_post(
    conn: &Connection,
    author_id: i64,
    subreddit_id: i64,
    title: &str,
    body: &str,
) -> ForumResult<i64> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM subreddits WHERE id = ?1",
        params![subreddit_id],
        |row| row.get(0),
    )?;
    if !exists {
        return Err(ForumError::NotFound(format!("subreddit {subreddit_id}")));
    }

    conn.execute(
        "INSERT INTO posts (title, body, created_at, author_id, subreddit_id)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![title, body, Utc::now(), author_id, subreddit_id],
    )?;
    let id = conn.last_insert_rowid();
    tracing::info!(post_id = id, author_id, subreddit_id, "Created post");
    Ok(id)
}

pub fn find_detail(conn: &Connection, id: i64) -> ForumResult<Option<PostSummary>> {
    Ok(conn
        .query_row(
            &format!("{SUMMARY_SELECT} WHERE p.id = ?1"),
            params![id],
            summary_from_row,
        )
        .optional()?)
}

/// Posts newest first, optionally limited to one subreddit. Scores are
/// summed from the vote ledger at query time.
pub fn list_posts(conn: &Connection, subreddit_id: Option<i64>) -> ForumResult<Vec<PostSummary>> {
    let order = "ORDER BY p.created_at DESC, p.id DESC";
    let posts = match subreddit_id {
        Some(sr) => {
            let mut stmt =
                conn.prepare(&format!("{SUMMARY_SELECT} WHERE p.subreddit_id = ?1 {order}"))?;
            let rows = stmt
                .query_map(params![sr], summary_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        }
        None => {
            let mut stmt = conn.prepare(&format!("{SUMMARY_SELECT} {order}"))?;
            let rows = stmt
                .query_map([], summary_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        }
    };
    Ok(posts)
}
