//! The vote ledger.
//!
//! Each user holds at most one vote per target. Casting a vote either
//! inserts it, flips an existing vote to the other direction, or removes
//! the vote when the same direction is cast twice.

use std::fmt;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use super::score::score;
use super::{is_constraint_violation, ForumError, ForumResult};

/// Attempts before a repeated constraint violation is reported as an error.
const MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn value(self) -> i64 {
        match self {
            Direction::Up => 1,
            Direction::Down => -1,
        }
    }

    pub fn from_value(value: i64) -> Option<Self> {
        match value {
            1 => Some(Direction::Up),
            -1 => Some(Direction::Down),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown vote direction: {0}")]
pub struct UnknownDirection(pub String);

impl FromStr for Direction {
    type Err = UnknownDirection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            other => Err(UnknownDirection(other.to_string())),
        }
    }
}

impl ToSql for Direction {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.value()))
    }
}

impl FromSql for Direction {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = i64::column_result(value)?;
        Direction::from_value(raw).ok_or(FromSqlError::OutOfRange(raw))
    }
}

/// What a vote is cast on. Stored as two nullable columns, but only ever
/// one of them is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoteTarget {
    Post(i64),
    Comment(i64),
}

impl VoteTarget {
    /// Build a target from a route segment such as `post` or `comment`.
    pub fn from_kind(kind: &str, id: i64) -> Option<Self> {
        match kind {
            "post" => Some(VoteTarget::Post(id)),
            "comment" => Some(VoteTarget::Comment(id)),
            _ => None,
        }
    }

    pub fn id(self) -> i64 {
        match self {
            VoteTarget::Post(id) | VoteTarget::Comment(id) => id,
        }
    }

    pub fn kind(self) -> &'static str {
        match self {
            VoteTarget::Post(_) => "post",
            VoteTarget::Comment(_) => "comment",
        }
    }

    pub(crate) fn column(self) -> &'static str {
        match self {
            VoteTarget::Post(_) => "post_id",
            VoteTarget::Comment(_) => "comment_id",
        }
    }
}

impl fmt::Display for VoteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.id())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteTransition {
    /// No vote existed; store one.
    Insert(Direction),
    /// Same direction cast again; the vote is withdrawn.
    Remove,
    /// Opposite direction; the stored value changes in place.
    Flip(Direction),
}

impl VoteTransition {
    pub fn plan(existing: Option<Direction>, requested: Direction) -> Self {
        match existing {
            None => VoteTransition::Insert(requested),
            Some(current) if current == requested => VoteTransition::Remove,
            Some(_) => VoteTransition::Flip(requested),
        }
    }

    /// The user's vote on the target once this transition is applied.
    pub fn resulting_state(self) -> Option<Direction> {
        match self {
            VoteTransition::Insert(d) | VoteTransition::Flip(d) => Some(d),
            VoteTransition::Remove => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteOutcome {
    pub transition: VoteTransition,
    pub state: Option<Direction>,
    /// Score of the target after the vote was applied.
    pub score: i64,
    /// The post the target lives under (the post itself for post votes).
    pub post_id: i64,
}

/// Apply a vote by `user_id` on `target`.
///
/// Runs as an IMMEDIATE transaction, so the lookup and the write happen
/// under SQLite's write lock and concurrent votes from the same user
/// serialise. If an insert still collides with the unique index the
/// transaction is rolled back and the lookup repeated, which lands the
/// request on the flip/remove path instead of failing.
pub fn cast_vote(
    conn: &mut Connection,
    user_id: i64,
    target: VoteTarget,
    direction: Direction,
) -> ForumResult<VoteOutcome> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match try_cast_vote(conn, user_id, target, direction) {
            Err(ForumError::Sql(e)) if is_constraint_violation(&e) && attempt < MAX_ATTEMPTS => {
                tracing::warn!(user_id, %target, attempt, "Vote collided with a concurrent write, retrying");
            }
            result => return result,
        }
    }
}

fn try_cast_vote(
    conn: &mut Connection,
    user_id: i64,
    target: VoteTarget,
    direction: Direction,
) -> ForumResult<VoteOutcome> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let post_id = owning_post(&tx, target)?
        .ok_or_else(|| ForumError::NotFound(target.to_string()))?;

    let existing: Option<(i64, Direction)> = tx
        .query_row(
            &format!(
                "SELECT id, value FROM votes WHERE user_id = ?1 AND {} = ?2",
                target.column()
            ),
            params![user_id, target.id()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let transition = VoteTransition::plan(existing.map(|(_, d)| d), direction);

    #[cfg(test)]
    tests::BEFORE_APPLY.with(|hook| {
        if let Some(hook) = hook.borrow().as_ref() {
            hook(&*tx);
        }
    });

    match existing {
        None => {
            tx.execute(
                &format!(
                    "INSERT INTO votes (value, user_id, {}) VALUES (?1, ?2, ?3)",
                    target.column()
                ),
                params![direction, user_id, target.id()],
            )?;
        }
        Some((vote_id, _)) => match transition.resulting_state() {
            None => {
                tx.execute("DELETE FROM votes WHERE id = ?1", params![vote_id])?;
            }
            Some(d) => {
                tx.execute(
                    "UPDATE votes SET value = ?1 WHERE id = ?2",
                    params![d, vote_id],
                )?;
            }
        },
    }

    let score = score(&tx, target)?;
    tx.commit()?;

    tracing::debug!(user_id, %target, ?transition, score, "Vote applied");

    Ok(VoteOutcome {
        transition,
        state: transition.resulting_state(),
        score,
        post_id,
    })
}

/// The user's current vote on `target`, if any.
pub fn current_vote(
    conn: &Connection,
    user_id: i64,
    target: VoteTarget,
) -> ForumResult<Option<Direction>> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT value FROM votes WHERE user_id = ?1 AND {} = ?2",
                target.column()
            ),
            params![user_id, target.id()],
            |row| row.get(0),
        )
        .optional()?)
}

fn owning_post(conn: &Connection, target: VoteTarget) -> ForumResult<Option<i64>> {
    let sql = match target {
        VoteTarget::Post(_) => "SELECT id FROM posts WHERE id = ?1",
        VoteTarget::Comment(_) => "SELECT post_id FROM comments WHERE id = ?1",
    };
    Ok(conn
        .query_row(sql, params![target.id()], |row| row.get(0))
        .optional()?)
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use super::*;
    use crate::forum::{comments, testing};

    type Hook = Box<dyn Fn(&Connection)>;

    thread_local! {
        /// Runs inside the vote transaction between the lookup and the write.
        pub(super) static BEFORE_APPLY: RefCell<Option<Hook>> = const { RefCell::new(None) };
    }

    fn with_before_apply<R>(hook: impl Fn(&Connection) + 'static, body: impl FnOnce() -> R) -> R {
        BEFORE_APPLY.with(|h| *h.borrow_mut() = Some(Box::new(hook)));
        let result = body();
        BEFORE_APPLY.with(|h| *h.borrow_mut() = None);
        result
    }

    /// Slips a competing vote in after the lookup, for the first `times` attempts.
    fn racing_vote(voter: i64, post: i64, times: u32) -> (Rc<Cell<u32>>, impl Fn(&Connection)) {
        let calls = Rc::new(Cell::new(0));
        let seen = Rc::clone(&calls);
        let hook = move |conn: &Connection| {
            seen.set(seen.get() + 1);
            if seen.get() <= times {
                conn.execute(
                    "INSERT INTO votes (value, user_id, post_id) VALUES (-1, ?1, ?2)",
                    params![voter, post],
                )
                .unwrap();
            }
        };
        (calls, hook)
    }

    fn vote_rows(conn: &Connection, user_id: i64, target: VoteTarget) -> i64 {
        conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM votes WHERE user_id = ?1 AND {} = ?2",
                target.column()
            ),
            params![user_id, target.id()],
            |r| r.get(0),
        )
        .unwrap()
    }

    #[test]
    fn transition_table() {
        use Direction::*;
        assert_eq!(VoteTransition::plan(None, Up), VoteTransition::Insert(Up));
        assert_eq!(VoteTransition::plan(None, Down), VoteTransition::Insert(Down));
        assert_eq!(VoteTransition::plan(Some(Up), Up), VoteTransition::Remove);
        assert_eq!(VoteTransition::plan(Some(Down), Down), VoteTransition::Remove);
        assert_eq!(VoteTransition::plan(Some(Up), Down), VoteTransition::Flip(Down));
        assert_eq!(VoteTransition::plan(Some(Down), Up), VoteTransition::Flip(Up));
    }

    #[test]
    fn direction_parsing_and_values() {
        assert_eq!("up".parse::<Direction>().unwrap(), Direction::Up);
        assert_eq!("down".parse::<Direction>().unwrap(), Direction::Down);
        assert!("sideways".parse::<Direction>().is_err());
        assert!("UP".parse::<Direction>().is_err());
        assert_eq!(Direction::Up.value(), 1);
        assert_eq!(Direction::Down.value(), -1);
        assert_eq!(Direction::from_value(0), None);
    }

    #[test]
    fn target_from_route_kind() {
        assert_eq!(VoteTarget::from_kind("post", 3), Some(VoteTarget::Post(3)));
        assert_eq!(
            VoteTarget::from_kind("comment", 4),
            Some(VoteTarget::Comment(4))
        );
        assert_eq!(VoteTarget::from_kind("user", 5), None);
    }

    #[test]
    fn first_upvote_inserts_and_raises_score() {
        let pool = testing::pool();
        let mut conn = pool.get().unwrap();
        let (_, post) = testing::post_fixture(&conn);
        let voter = testing::user(&conn, "voter");
        let target = VoteTarget::Post(post);

        let before = score(&conn, target).unwrap();
        let outcome = cast_vote(&mut conn, voter, target, Direction::Up).unwrap();

        assert_eq!(outcome.transition, VoteTransition::Insert(Direction::Up));
        assert_eq!(outcome.state, Some(Direction::Up));
        assert_eq!(outcome.score, before + 1);
        assert_eq!(outcome.post_id, post);
        assert_eq!(current_vote(&conn, voter, target).unwrap(), Some(Direction::Up));
    }

    #[test]
    fn opposite_direction_flips_in_place() {
        let pool = testing::pool();
        let mut conn = pool.get().unwrap();
        let (_, post) = testing::post_fixture(&conn);
        let voter = testing::user(&conn, "voter");
        let target = VoteTarget::Post(post);

        cast_vote(&mut conn, voter, target, Direction::Up).unwrap();
        let id_before: i64 = conn
            .query_row("SELECT id FROM votes", [], |r| r.get(0))
            .unwrap();
        let before = score(&conn, target).unwrap();

        let outcome = cast_vote(&mut conn, voter, target, Direction::Down).unwrap();
        let id_after: i64 = conn
            .query_row("SELECT id FROM votes", [], |r| r.get(0))
            .unwrap();

        assert_eq!(outcome.transition, VoteTransition::Flip(Direction::Down));
        assert_eq!(outcome.score, before - 2);
        assert_eq!(id_before, id_after);
        assert_eq!(vote_rows(&conn, voter, target), 1);
    }

    #[test]
    fn repeating_a_direction_toggles_off() {
        let pool = testing::pool();
        let mut conn = pool.get().unwrap();
        let (_, post) = testing::post_fixture(&conn);
        let voter = testing::user(&conn, "voter");
        let target = VoteTarget::Post(post);

        cast_vote(&mut conn, voter, target, Direction::Up).unwrap();
        let before = score(&conn, target).unwrap();
        let outcome = cast_vote(&mut conn, voter, target, Direction::Up).unwrap();

        assert_eq!(outcome.transition, VoteTransition::Remove);
        assert_eq!(outcome.state, None);
        assert_eq!(outcome.score, before - 1);
        assert_eq!(vote_rows(&conn, voter, target), 0);
    }

    #[test]
    fn removing_a_downvote_raises_score_by_one() {
        let pool = testing::pool();
        let mut conn = pool.get().unwrap();
        let (_, post) = testing::post_fixture(&conn);
        let voter = testing::user(&conn, "voter");
        let target = VoteTarget::Post(post);

        cast_vote(&mut conn, voter, target, Direction::Down).unwrap();
        assert_eq!(score(&conn, target).unwrap(), -1);
        let outcome = cast_vote(&mut conn, voter, target, Direction::Down).unwrap();
        assert_eq!(outcome.score, 0);
    }

    #[test]
    fn vote_sequence_matches_model() {
        let pool = testing::pool();
        let mut conn = pool.get().unwrap();
        let (_, post) = testing::post_fixture(&conn);
        let voter = testing::user(&conn, "voter");
        let other = testing::user(&conn, "other");
        let target = VoteTarget::Post(post);

        cast_vote(&mut conn, other, target, Direction::Up).unwrap();

        let sequence = "up up down down up down up up down up down down down";
        let mut expected: Option<Direction> = None;
        for step in sequence.split_whitespace() {
            let direction: Direction = step.parse().unwrap();
            expected = VoteTransition::plan(expected, direction).resulting_state();

            let outcome = cast_vote(&mut conn, voter, target, direction).unwrap();
            assert_eq!(outcome.state, expected);
            assert_eq!(current_vote(&conn, voter, target).unwrap(), expected);
            assert!(vote_rows(&conn, voter, target) <= 1);

            let mine = expected.map(Direction::value).unwrap_or(0);
            assert_eq!(score(&conn, target).unwrap(), 1 + mine);
        }
    }

    #[test]
    fn comment_votes_are_separate_from_post_votes() {
        let pool = testing::pool();
        let mut conn = pool.get().unwrap();
        let (author, post) = testing::post_fixture(&conn);
        let comment = comments::create_comment(&conn, author, post, "first").unwrap();
        let voter = testing::user(&conn, "voter");

        cast_vote(&mut conn, voter, VoteTarget::Post(post), Direction::Up).unwrap();
        let outcome =
            cast_vote(&mut conn, voter, VoteTarget::Comment(comment), Direction::Down).unwrap();

        assert_eq!(outcome.transition, VoteTransition::Insert(Direction::Down));
        assert_eq!(outcome.post_id, post);
        assert_eq!(score(&conn, VoteTarget::Post(post)).unwrap(), 1);
        assert_eq!(score(&conn, VoteTarget::Comment(comment)).unwrap(), -1);
    }

    #[test]
    fn voting_on_missing_target_is_not_found() {
        let pool = testing::pool();
        let mut conn = pool.get().unwrap();
        let voter = testing::user(&conn, "voter");

        let err = cast_vote(&mut conn, voter, VoteTarget::Post(404), Direction::Up).unwrap_err();
        assert!(matches!(err, ForumError::NotFound(_)));
        let err =
            cast_vote(&mut conn, voter, VoteTarget::Comment(404), Direction::Up).unwrap_err();
        assert!(matches!(err, ForumError::NotFound(_)));

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM votes", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn deleting_a_post_cascades_to_comments_and_votes() {
        let pool = testing::pool();
        let mut conn = pool.get().unwrap();
        let (author, post) = testing::post_fixture(&conn);
        let comment = comments::create_comment(&conn, author, post, "first").unwrap();
        cast_vote(&mut conn, author, VoteTarget::Post(post), Direction::Up).unwrap();
        cast_vote(&mut conn, author, VoteTarget::Comment(comment), Direction::Up).unwrap();

        conn.execute("DELETE FROM posts WHERE id = ?1", params![post])
            .unwrap();

        let remaining: (i64, i64) = conn
            .query_row(
                "SELECT (SELECT COUNT(*) FROM comments), (SELECT COUNT(*) FROM votes)",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(remaining, (0, 0));
    }

    #[test]
    fn concurrent_votes_keep_one_row_per_user() {
        let tmp = tempfile::tempdir().unwrap();
        let pool = crate::db::create_pool(&tmp.path().join("votes.db")).unwrap();
        crate::db::run_migrations(&pool).unwrap();

        let (voter, post) = {
            let conn = pool.get().unwrap();
            testing::post_fixture(&conn)
        };
        let target = VoteTarget::Post(post);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = pool.clone();
                std::thread::spawn(move || {
                    let mut conn = pool.get().unwrap();
                    cast_vote(&mut conn, voter, target, Direction::Up).unwrap()
                })
            })
            .collect();

        let outcomes: Vec<VoteOutcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let inserts = outcomes
            .iter()
            .filter(|o| o.transition == VoteTransition::Insert(Direction::Up))
            .count();
        let removes = outcomes
            .iter()
            .filter(|o| o.transition == VoteTransition::Remove)
            .count();

        // Eight serialised toggles alternate insert/remove and end with no vote.
        assert_eq!(inserts, 4);
        assert_eq!(removes, 4);

        let conn = pool.get().unwrap();
        assert_eq!(vote_rows(&conn, voter, target), 0);
        assert_eq!(score(&conn, target).unwrap(), 0);
    }

    #[test]
    fn colliding_insert_is_retried_and_applied() {
        let pool = testing::pool();
        let mut conn = pool.get().unwrap();
        let (_, post) = testing::post_fixture(&conn);
        let voter = testing::user(&conn, "voter");

        let (calls, hook) = racing_vote(voter, post, 1);
        let outcome = with_before_apply(hook, || {
            cast_vote(&mut conn, voter, VoteTarget::Post(post), Direction::Up)
        })
        .unwrap();

        assert_eq!(calls.get(), 2);
        assert_eq!(outcome.transition, VoteTransition::Insert(Direction::Up));
        assert_eq!(outcome.score, 1);
        assert_eq!(vote_rows(&conn, voter, VoteTarget::Post(post)), 1);
    }

    #[test]
    fn persistent_collision_gives_up_after_max_attempts() {
        let pool = testing::pool();
        let mut conn = pool.get().unwrap();
        let (_, post) = testing::post_fixture(&conn);
        let voter = testing::user(&conn, "voter");

        let (calls, hook) = racing_vote(voter, post, u32::MAX);
        let err = with_before_apply(hook, || {
            cast_vote(&mut conn, voter, VoteTarget::Post(post), Direction::Up)
        })
        .unwrap_err();

        assert_eq!(calls.get(), MAX_ATTEMPTS);
        assert!(matches!(err, ForumError::Sql(ref e) if is_constraint_violation(e)));
        assert_eq!(vote_rows(&conn, voter, VoteTarget::Post(post)), 0);
    }
}
