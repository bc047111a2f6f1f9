use chrono::Utc;
use rusqlite::{params, Connection};

use super::{ForumError, ForumResult};
use crate::db::models::CommentView;

pub fn create_comment(
    conn: &Connection,
    author_id: i64,
    post_id: i64,
    body: &str,
) -> ForumResult<i64> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM posts WHERE id = ?1",
        params![post_id],
        |row| row.get(0),
    )?;
    if !exists {
        return Err(ForumError::NotFound(format!("post {post_id}")));
    }

    conn.execute(
        "INSERT INTO comments (body, created_at, author_id, post_id) VALUES (?1, ?2, ?3, ?4)",
        params![body, Utc::now(), author_id, post_id],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Comments on a post in the order they were written.
pub fn list_for_post(conn: &Connection, post_id: i64) -> ForumResult<Vec<CommentView>> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.body, c.created_at, c.author_id, u.username, c.post_id,
                (SELECT COALESCE(SUM(v.value), 0) FROM votes v WHERE v.comment_id = c.id)
         FROM comments c
         JOIN users u ON u.id = c.author_id
         WHERE c.post_id = ?1
         ORDER BY c.created_at, c.id",
    )?;
    let rows = stmt
        .query_map(params![post_id], |row| {
            Ok(CommentView {
                id: row.get(0)?,
                body: row.get(1)?,
                created_at: row.get(2)?,
                author_id: row.get(3)?,
                author: row.get(4)?,
                post_id: row.get(5)?,
                score: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
