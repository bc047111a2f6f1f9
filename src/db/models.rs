use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Subreddit {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub creator_id: i64,
    pub created_at: DateTime<Utc>,
}

/// A post as shown in listings and on its detail page, joined with its
/// author, subreddit and current score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostSummary {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub author_id: i64,
    pub author: String,
    pub subreddit_id: i64,
    pub subreddit: String,
    pub score: i64,
    pub comment_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentView {
    pub id: i64,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub author_id: i64,
    pub author: String,
    pub post_id: i64,
    pub score: i64,
}
