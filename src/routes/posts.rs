use askama::Template;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Form, Router};
use rusqlite::Connection;
use serde::Deserialize;

use crate::db::models::{CommentView, PostSummary, Subreddit};
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, MaybeUser};
use crate::forum::vote::{current_vote, Direction, VoteTarget};
use crate::forum::{comments, posts, subreddits, validate, ForumError, ForumResult};
use crate::routes::home::Html;
use crate::routes::warn_on_form;
use crate::state::AppState;

#[derive(Template)]
#[template(path = "pages/create_post.html")]
pub struct CreatePostTemplate {
    pub current_user: Option<String>,
    pub warning: Option<String>,
    pub subreddits: Vec<Subreddit>,
    /// Preselected subreddit id, 0 for none.
    pub selected: i64,
    pub title: String,
    pub body: String,
}

pub struct CommentRow {
    pub comment: CommentView,
    /// The viewer's vote as +1/-1, or 0.
    pub my_vote: i64,
}

#[derive(Template)]
#[template(path = "pages/post_detail.html")]
pub struct PostDetailTemplate {
    pub current_user: Option<String>,
    pub warning: Option<String>,
    pub post: PostSummary,
    pub my_vote: i64,
    pub comments: Vec<CommentRow>,
}

#[derive(Deserialize, Default)]
pub struct NewPostQuery {
    pub subreddit: Option<i64>,
}

#[derive(Deserialize)]
pub struct PostForm {
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub subreddit: String,
}

#[derive(Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub body: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/post/new", get(new_page).post(create))
        .route("/post/{id}", get(detail).post(add_comment))
}

async fn new_page(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<NewPostQuery>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    Ok(Html(CreatePostTemplate {
        current_user: Some(user.username),
        warning: None,
        subreddits: subreddits::list_by_name(&conn)?,
        selected: query.subreddit.unwrap_or(0),
        title: String::new(),
        body: String::new(),
    })
    .into_response())
}

async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(form): Form<PostForm>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let title = form.title.trim();
    let selected = form.subreddit.trim().parse::<i64>().ok();

    let result = validate::post_title(title).and_then(|_| {
        let subreddit_id =
            selected.ok_or_else(|| ForumError::Validation("Invalid subreddit.".into()))?;
        posts::create_post(&conn, user.id, subreddit_id, title, &form.body).map_err(|e| match e {
            ForumError::NotFound(_) => ForumError::Validation("Invalid subreddit.".into()),
            other => other,
        })
    });

    match result {
        Ok(id) => Ok(Redirect::to(&format!("/post/{id}")).into_response()),
        Err(e) => {
            let choices = subreddits::list_by_name(&conn)?;
            warn_on_form(e, |warning| {
                Html(CreatePostTemplate {
                    current_user: Some(user.username.clone()),
                    warning: Some(warning),
                    subreddits: choices,
                    selected: selected.unwrap_or(0),
                    title: title.to_string(),
                    body: form.body.clone(),
                })
                .into_response()
            })
        }
    }
}

fn vote_value(vote: Option<Direction>) -> i64 {
    vote.map(Direction::value).unwrap_or(0)
}

/// Everything the detail page needs, with the viewer's own votes marked.
fn load_detail(
    conn: &Connection,
    id: i64,
    viewer: Option<&CurrentUser>,
    warning: Option<String>,
) -> ForumResult<PostDetailTemplate> {
    let post =
        posts::find_detail(conn, id)?.ok_or_else(|| ForumError::NotFound(format!("post {id}")))?;

    let mine = |target: VoteTarget| -> ForumResult<i64> {
        match viewer {
            Some(user) => Ok(vote_value(current_vote(conn, user.id, target)?)),
            None => Ok(0),
        }
    };

    let my_vote = mine(VoteTarget::Post(post.id))?;
    let comments = comments::list_for_post(conn, post.id)?
        .into_iter()
        .map(|comment| {
            Ok(CommentRow {
                my_vote: mine(VoteTarget::Comment(comment.id))?,
                comment,
            })
        })
        .collect::<ForumResult<Vec<_>>>()?;

    Ok(PostDetailTemplate {
        current_user: viewer.map(|u| u.username.clone()),
        warning,
        post,
        my_vote,
        comments,
    })
}

async fn detail(
    State(state): State<AppState>,
    maybe_user: MaybeUser,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let page = load_detail(&conn, id, maybe_user.0.as_ref(), None)?;
    Ok(Html(page).into_response())
}

async fn add_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Form(form): Form<CommentForm>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let body = form.body.trim();

    let result = validate::comment_body(body)
        .and_then(|_| comments::create_comment(&conn, user.id, id, body));

    match result {
        Ok(_) => Ok(Redirect::to(&format!("/post/{id}")).into_response()),
        Err(ForumError::NotFound(_)) => Err(AppError::NotFound),
        Err(e) => match e.user_warning() {
            Some(warning) => {
                let page = load_detail(&conn, id, Some(&user), Some(warning.to_string()))?;
                Ok(Html(page).into_response())
            }
            None => Err(e.into()),
        },
    }
}
