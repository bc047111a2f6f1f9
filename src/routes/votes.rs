use axum::extract::{Path, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::post;
use axum::Router;

use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::forum::vote::{self, Direction, VoteTarget};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/vote/{kind}/{id}/{direction}", post(cast))
}

/// POST /vote/{post|comment}/{id}/{up|down}
///
/// Redirects back to the referring page, or to the post the target lives on.
async fn cast(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((kind, id, direction)): Path<(String, i64, String)>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let target = VoteTarget::from_kind(&kind, id).ok_or(AppError::NotFound)?;
    let direction: Direction = direction
        .parse()
        .map_err(|e: vote::UnknownDirection| AppError::BadRequest(e.to_string()))?;

    let outcome = {
        let mut conn = state.db.get()?;
        vote::cast_vote(&mut conn, user.id, target, direction)?
    };

    let back = headers
        .get(header::REFERER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| format!("/post/{}", outcome.post_id));

    Ok(Redirect::to(&back).into_response())
}
