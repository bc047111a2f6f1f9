use askama::Template;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::db::models::{PostSummary, Subreddit};
use crate::error::AppResult;
use crate::extractors::MaybeUser;
use crate::forum::listing::{sort_posts, SortMode};
use crate::forum::posts;
use crate::state::AppState;

/// Shared by the front page and subreddit pages.
#[derive(Template)]
#[template(path = "pages/index.html")]
pub struct ListingTemplate {
    pub current_user: Option<String>,
    pub subreddit: Option<Subreddit>,
    pub posts: Vec<PostSummary>,
    pub sort: &'static str,
}

#[derive(Deserialize, Default)]
pub struct ListingQuery {
    pub sort: Option<String>,
}

impl ListingQuery {
    pub fn mode(&self) -> SortMode {
        SortMode::from_param(self.sort.as_deref())
    }
}

/// Wrapper to render askama templates as axum responses
pub struct Html<T: Template>(pub T);

impl<T: Template> IntoResponse for Html<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                body,
            )
                .into_response(),
            Err(e) => {
                tracing::error!("Template render error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
            }
        }
    }
}

pub async fn index(
    State(state): State<AppState>,
    maybe_user: MaybeUser,
    Query(query): Query<ListingQuery>,
) -> AppResult<Response> {
    let mode = query.mode();
    let posts = {
        let conn = state.db.get()?;
        posts::list_posts(&conn, None)?
    };

    Ok(Html(ListingTemplate {
        current_user: maybe_user.username(),
        subreddit: None,
        posts: sort_posts(posts, mode),
        sort: mode.as_str(),
    })
    .into_response())
}
