use std::cmp::Reverse;
use std::str::FromStr;

use crate::db::models::PostSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortMode {
    /// Highest score first.
    #[default]
    Hot,
    /// Most recently created first.
    New,
}

impl SortMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SortMode::Hot => "hot",
            SortMode::New => "new",
        }
    }

    /// Read the `sort` query parameter; anything unrecognised means hot.
    pub fn from_param(param: Option<&str>) -> Self {
        param.and_then(|p| p.parse().ok()).unwrap_or_default()
    }
}

impl FromStr for SortMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hot" => Ok(SortMode::Hot),
            "new" => Ok(SortMode::New),
            _ => Err(()),
        }
    }
}

/// Order posts for display.
///
/// `Hot` is a stable sort on score, so posts with equal scores keep the
/// order they came in. `New` breaks timestamp ties by id, newest id first.
pub fn sort_posts(mut posts: Vec<PostSummary>, mode: SortMode) -> Vec<PostSummary> {
    match mode {
        SortMode::Hot => posts.sort_by_key(|p| Reverse(p.score)),
        SortMode::New => posts.sort_by_key(|p| Reverse((p.created_at, p.id))),
    }
    posts
}
