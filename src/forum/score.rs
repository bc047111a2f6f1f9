use rusqlite::{params, Connection};

use super::vote::VoteTarget;
use super::ForumResult;

/// Sum of all vote values on `target`; zero when nobody has voted.
/// Always read from the ledger, never cached.
pub fn score(conn: &Connection, target: VoteTarget) -> ForumResult<i64> {
    let sql = format!(
        "SELECT COALESCE(SUM(value), 0) FROM votes WHERE {} = ?1",
        target.column()
    );
    Ok(conn.query_row(&sql, params![target.id()], |row| row.get(0))?)
}
