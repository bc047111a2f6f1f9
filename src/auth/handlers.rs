use askama::Template;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Form;
use serde::Deserialize;

use crate::auth::{password, session};
use crate::error::AppResult;
use crate::extractors::{cookie_value, MaybeUser};
use crate::forum::{users, validate};
use crate::routes::home::Html;
use crate::routes::warn_on_form;
use crate::state::AppState;

// -- Templates --

#[derive(Template)]
#[template(path = "pages/register.html")]
pub struct RegisterTemplate {
    pub current_user: Option<String>,
    pub warning: Option<String>,
    pub username: String,
}

#[derive(Template)]
#[template(path = "pages/login.html")]
pub struct LoginTemplate {
    pub current_user: Option<String>,
    pub warning: Option<String>,
    pub registered: bool,
    pub username: String,
}

// -- Request types --

#[derive(Deserialize)]
pub struct CredentialsForm {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize, Default)]
pub struct LoginQuery {
    pub registered: Option<String>,
}

// -- Cookie helpers --

fn session_cookie(name: &str, token: &str, max_age_hours: u64) -> String {
    let max_age_secs = max_age_hours * 3600;
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
        name, token, max_age_secs
    )
}

fn clear_session_cookie(name: &str) -> String {
    format!("{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0", name)
}

fn register_form(username: &str, warning: String) -> Response {
    Html(RegisterTemplate {
        current_user: None,
        warning: Some(warning),
        username: username.to_string(),
    })
    .into_response()
}

// -- Registration --

/// GET /register
pub async fn register_page(maybe_user: MaybeUser) -> Response {
    if maybe_user.0.is_some() {
        return Redirect::to("/").into_response();
    }

    Html(RegisterTemplate {
        current_user: None,
        warning: None,
        username: String::new(),
    })
    .into_response()
}

/// POST /register — create the account, then send the user to log in
pub async fn register(
    State(state): State<AppState>,
    maybe_user: MaybeUser,
    Form(form): Form<CredentialsForm>,
) -> AppResult<Response> {
    if maybe_user.0.is_some() {
        return Ok(Redirect::to("/").into_response());
    }

    let username = form.username.trim();
    if let Err(e) = validate::username(username).and_then(|_| validate::password(&form.password))
    {
        return warn_on_form(e, |w| register_form(username, w));
    }

    let hash = password::hash_password(&form.password, state.config.auth.bcrypt_cost)?;

    let conn = state.db.get()?;
    match users::create_user(&conn, username, &hash) {
        Ok(_) => Ok(Redirect::to("/login?registered=1").into_response()),
        Err(e) => warn_on_form(e, |w| register_form(username, w)),
    }
}

// -- Login --

/// GET /login
pub async fn login_page(maybe_user: MaybeUser, Query(query): Query<LoginQuery>) -> Response {
    if maybe_user.0.is_some() {
        return Redirect::to("/").into_response();
    }

    Html(LoginTemplate {
        current_user: None,
        warning: None,
        registered: query.registered.is_some(),
        username: String::new(),
    })
    .into_response()
}

/// POST /login — verify credentials and start a session
pub async fn login(
    State(state): State<AppState>,
    maybe_user: MaybeUser,
    Form(form): Form<CredentialsForm>,
) -> AppResult<Response> {
    if maybe_user.0.is_some() {
        return Ok(Redirect::to("/").into_response());
    }

    let username = form.username.trim();
    let user = {
        let conn = state.db.get()?;
        users::find_by_username(&conn, username)?
    };

    let user = match user {
        Some(user) if password::verify_password(&form.password, &user.password_hash) => user,
        _ => {
            tracing::info!(username, "Failed login attempt");
            return Ok(Html(LoginTemplate {
                current_user: None,
                warning: Some("Invalid credentials.".to_string()),
                registered: false,
                username: username.to_string(),
            })
            .into_response());
        }
    };

    let auth = &state.config.auth;
    let token = session::create_session(&state.db, user.id, auth.session_hours)?;
    tracing::info!(user_id = user.id, "Logged in");

    Ok((
        [(
            header::SET_COOKIE,
            session_cookie(&auth.cookie_name, &token, auth.session_hours),
        )],
        Redirect::to("/"),
    )
        .into_response())
}

// -- Logout --

/// POST /logout — delete session and redirect home
pub async fn logout(
    State(state): State<AppState>,
    request: axum::http::Request<axum::body::Body>,
) -> Response {
    let (parts, _body) = request.into_parts();
    let cookie_name = &state.config.auth.cookie_name;

    if let Some(token) = cookie_value(&parts, cookie_name) {
        if let Err(e) = session::delete_session(&state.db, token) {
            tracing::warn!("Failed to delete session: {}", e);
        }
    }

    (
        [(header::SET_COOKIE, clear_session_cookie(cookie_name))],
        Redirect::to("/"),
    )
        .into_response()
}
