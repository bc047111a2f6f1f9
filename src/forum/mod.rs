//! Forum domain: entities, the vote ledger, score aggregation and listing
//! order. Every operation takes the acting user's id explicitly; nothing in
//! here knows about HTTP or sessions.

pub mod comments;
pub mod listing;
pub mod posts;
pub mod score;
pub mod subreddits;
pub mod users;
pub mod validate;
pub mod vote;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ForumError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(String),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),
}

impl ForumError {
    /// Messages that belong on the form the user just submitted rather than
    /// on an error page.
    pub fn user_warning(&self) -> Option<&str> {
        match self {
            ForumError::Conflict(msg) | ForumError::Validation(msg) => Some(msg.as_str()),
            _ => None,
        }
    }
}

pub type ForumResult<T> = Result<T, ForumError>;

/// True when `err` is SQLite rejecting a row over a UNIQUE/CHECK/FK constraint.
pub(crate) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

#[cfg(test)]
pub(crate) mod testing {
    use rusqlite::Connection;

    use crate::db::{create_memory_pool, run_migrations};
    use crate::state::DbPool;

    pub fn pool() -> DbPool {
        let pool = create_memory_pool().unwrap();
        run_migrations(&pool).unwrap();
        pool
    }

    pub fn user(conn: &Connection, name: &str) -> i64 {
        super::users::create_user(conn, name, "not-a-real-hash").unwrap()
    }

    /// A user, a subreddit and one post by that user.
    pub fn post_fixture(conn: &Connection) -> (i64, i64) {
        let author = user(conn, "author");
        let sr = super::subreddits::create_subreddit(conn, author, "rust", "").unwrap();
        let post = super::posts::create_post(conn, author, sr, "Hello", "world").unwrap();
        (author, post)
    }
}
