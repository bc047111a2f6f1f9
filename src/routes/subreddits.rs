use askama::Template;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Form, Router};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, MaybeUser};
use crate::forum::listing::sort_posts;
use crate::forum::{posts, subreddits, validate};
use crate::routes::home::{Html, ListingQuery, ListingTemplate};
use crate::routes::warn_on_form;
use crate::state::AppState;

#[derive(Template)]
#[template(path = "pages/create_subreddit.html")]
pub struct CreateSubredditTemplate {
    pub current_user: Option<String>,
    pub warning: Option<String>,
    pub name: String,
    pub description: String,
}

#[derive(Deserialize)]
pub struct SubredditForm {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/r/new", get(new_page).post(create))
        .route("/r/{name}", get(show))
}

async fn new_page(user: CurrentUser) -> Response {
    Html(CreateSubredditTemplate {
        current_user: Some(user.username),
        warning: None,
        name: String::new(),
        description: String::new(),
    })
    .into_response()
}

async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(form): Form<SubredditForm>,
) -> AppResult<Response> {
    let name = form.name.trim();
    let description = form.description.trim();
    let rerender = |warning: String| {
        Html(CreateSubredditTemplate {
            current_user: Some(user.username.clone()),
            warning: Some(warning),
            name: name.to_string(),
            description: description.to_string(),
        })
        .into_response()
    };

    if let Err(e) = validate::subreddit_name(name) {
        return warn_on_form(e, rerender);
    }

    let conn = state.db.get()?;
    match subreddits::create_subreddit(&conn, user.id, name, description) {
        Ok(_) => Ok(Redirect::to(&format!("/r/{name}")).into_response()),
        Err(e) => warn_on_form(e, rerender),
    }
}

async fn show(
    State(state): State<AppState>,
    maybe_user: MaybeUser,
    Path(name): Path<String>,
    Query(query): Query<ListingQuery>,
) -> AppResult<Response> {
    let mode = query.mode();
    let (subreddit, posts) = {
        let conn = state.db.get()?;
        let subreddit = subreddits::find_by_name(&conn, &name)?.ok_or(AppError::NotFound)?;
        let posts = posts::list_posts(&conn, Some(subreddit.id))?;
        (subreddit, posts)
    };

    Ok(Html(ListingTemplate {
        current_user: maybe_user.username(),
        subreddit: Some(subreddit),
        posts: sort_posts(posts, mode),
        sort: mode.as_str(),
    })
    .into_response())
}
