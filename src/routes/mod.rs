pub mod assets;
pub mod auth;
pub mod home;
pub mod posts;
pub mod subreddits;
pub mod votes;

use axum::response::Response;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::error::AppResult;
use crate::forum::ForumError;
use crate::state::AppState;

/// The full application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(home::index))
        .route("/assets/{*path}", get(assets::serve))
        .merge(auth::router())
        .merge(subreddits::router())
        .merge(posts::router())
        .merge(votes::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Re-render a form with the error's message when it is one the user can
/// fix; anything else becomes an error response.
pub(crate) fn warn_on_form(
    err: ForumError,
    render: impl FnOnce(String) -> Response,
) -> AppResult<Response> {
    match err.user_warning() {
        Some(message) => Ok(render(message.to_string())),
        None => Err(err.into()),
    }
}
