//! HTTP routes.
//!
//! Provides:
//! - `/` - home page with login state and course links
//! - `/login`, `/login/github/authorized`, `/getlogin`, `/logout` - OAuth flow
//! - `/{course}/` - login-gated submission form
//! - `/{course}/submit` - submission pipeline, redirects back to the form
//! - `/health` - liveness check

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, Uri, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};
use handin_common::identity::{IdentityError, current_login};
use handin_common::types::{Flash, SubmissionForm};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::pages::{self, Viewer};
use crate::session::Session;
use crate::state::PortalState;
use crate::submit::process_submission;

pub const LOGIN_FAILED: &str = "ERROR: login failed";

type AppState = State<Arc<PortalState>>;

/// Create the portal router.
pub fn create_router(state: Arc<PortalState>) -> Router {
    Router::new()
        .route("/", get(home_handler))
        .route("/health", get(health_handler))
        .route("/login", get(login_handler))
        .route("/login/github/authorized", get(authorized_handler))
        .route("/logout", get(logout_handler))
        .route("/getlogin", get(getlogin_handler))
        .route("/{course}", get(course_redirect_handler))
        .route("/{course}/", get(course_handler))
        .route("/{course}/submit", get(submit_handler))
        .fallback(not_found_handler)
        .with_state(state)
}

/// Persist the session and attach its cookie to `response`.
fn finish(state: &PortalState, session: Session, response: impl IntoResponse) -> Response {
    let mut response = response.into_response();
    if let Some(cookie) = state.sessions.commit(session) {
        response.headers_mut().append(header::SET_COOKIE, cookie);
    }
    response
}

fn viewer(session: &Session) -> Viewer<'_> {
    Viewer {
        authenticated: session.is_authenticated(),
        login: session.login(),
    }
}

/// Require a logged-in user with a known login.
///
/// On failure `return_to` is remembered and the redirect to send is
/// returned.
fn require_login(session: &mut Session, return_to: &str) -> Result<String, Redirect> {
    if !session.is_authenticated() {
        session.data.previous_url = Some(return_to.to_string());
        return Err(Redirect::to("/login"));
    }
    match session.login() {
        Some(login) => Ok(login.to_string()),
        None => {
            session.data.previous_url = Some(return_to.to_string());
            Err(Redirect::to("/getlogin"))
        }
    }
}

fn course_home(slug: &str) -> String {
    format!("/{slug}/")
}

async fn home_handler(State(state): AppState, headers: HeaderMap) -> Response {
    let mut session = state.sessions.load(&headers);
    let flashes = session.take_flashes();
    let html = pages::home_page(
        &viewer(&session),
        &flashes,
        &state.courses,
        state.identity.client_id(),
    );
    finish(&state, session, Html(html))
}

async fn health_handler(State(state): AppState) -> impl IntoResponse {
    let courses: Vec<&str> = state.courses.iter().map(|c| c.slug()).collect();
    Json(json!({
        "status": "healthy",
        "version": state.version,
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "courses": courses,
    }))
}

async fn login_handler(State(state): AppState, headers: HeaderMap) -> Response {
    let mut session = state.sessions.load(&headers);
    let oauth_state = Uuid::new_v4().to_string();
    let target = state.identity.authorize_url(&oauth_state);
    session.data.oauth_state = Some(oauth_state);
    finish(&state, session, Redirect::to(&target))
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

async fn authorized_handler(
    State(state): AppState,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
) -> Response {
    let mut session = state.sessions.load(&headers);
    let expected = session.data.oauth_state.take();

    let result = match (params.code, params.error) {
        (_, Some(denied)) => Err(IdentityError::Denied(denied)),
        (None, None) => Err(IdentityError::Decode("callback without code".to_string())),
        (Some(code), None) => {
            if expected.is_none() || params.state != expected {
                Err(IdentityError::StateMismatch)
            } else {
                let identity = Arc::clone(&state.identity);
                tokio::task::spawn_blocking(move || identity.exchange_code(&code))
                    .await
                    .unwrap_or_else(|e| Err(IdentityError::Transport(e.to_string())))
            }
        }
    };

    match result {
        Ok(token) => {
            session.data.oauth_token = Some(token);
            session.data.login = None;
            finish(&state, session, Redirect::to("/getlogin"))
        }
        Err(err) => {
            warn!(code = %err.code().code_string(), error = %err, "Login callback failed");
            session.flash(Flash::danger(LOGIN_FAILED));
            finish(&state, session, Redirect::to("/"))
        }
    }
}

async fn logout_handler(State(state): AppState, headers: HeaderMap) -> Response {
    let mut session = state.sessions.load(&headers);
    if session.is_authenticated() {
        if let Some(login) = session.login() {
            info!(identity = login, "Logged out");
        }
        session.clear();
    }
    finish(&state, session, Redirect::to("/"))
}

async fn getlogin_handler(State(state): AppState, headers: HeaderMap) -> Response {
    let mut session = state.sessions.load(&headers);

    let pending = match (&session.data.oauth_token, &session.data.login) {
        (Some(token), None) => Some(token.clone()),
        _ => None,
    };
    if let Some(token) = pending {
        match current_login(Arc::clone(&state.identity), token, &state.login_policy).await {
            Ok(login) => {
                info!(identity = %login, "Logged in");
                session.data.login = Some(login);
            }
            Err(err) => {
                warn!(code = %err.code().code_string(), error = %err, "Clearing session");
                session.clear();
                return finish(&state, session, Redirect::to("/"));
            }
        }
    }

    if let Some(previous) = session.data.previous_url.take() {
        if session.is_authenticated() {
            return finish(&state, session, Redirect::to(&previous));
        }
    }
    finish(&state, session, Redirect::to("/"))
}

async fn course_redirect_handler(
    State(state): AppState,
    headers: HeaderMap,
    Path(course): Path<String>,
    uri: Uri,
) -> Response {
    match state.course(&course) {
        Some(runtime) => Redirect::permanent(&course_home(runtime.slug())).into_response(),
        None => not_found(&state, &headers, &uri),
    }
}

async fn course_handler(
    State(state): AppState,
    headers: HeaderMap,
    Path(course): Path<String>,
    uri: Uri,
) -> Response {
    let Some(runtime) = state.course(&course) else {
        return not_found(&state, &headers, &uri);
    };
    let mut session = state.sessions.load(&headers);
    if let Err(redirect) = require_login(&mut session, uri.path()) {
        return finish(&state, session, redirect);
    }

    let flashes = session.take_flashes();
    let form = session.form(runtime.slug());
    let html = pages::course_page(&viewer(&session), &flashes, runtime, &form);
    finish(&state, session, Html(html))
}

async fn submit_handler(
    State(state): AppState,
    headers: HeaderMap,
    Path(course): Path<String>,
    uri: Uri,
    Query(form): Query<SubmissionForm>,
) -> Response {
    let Some(runtime) = state.course(&course) else {
        return not_found(&state, &headers, &uri);
    };
    let home = course_home(runtime.slug());
    let mut session = state.sessions.load(&headers);
    // A replayed submit without its query would only fail validation, so
    // login returns to the form instead.
    let identity = match require_login(&mut session, &home) {
        Ok(identity) => identity,
        Err(redirect) => return finish(&state, session, redirect),
    };

    let form = form.trimmed();
    session
        .data
        .forms
        .insert(runtime.slug().to_string(), form.clone());

    match process_submission(runtime, &state.prober, &identity, &form, state.tz).await {
        Ok(report) => {
            for flash in report.flashes {
                session.flash(flash);
            }
            finish(&state, session, Redirect::to(&home))
        }
        Err(err) => {
            let code = err.code();
            error!(
                course = runtime.slug(),
                identity = %identity,
                code = %code.code_string(),
                error = %err,
                "Submission failed"
            );
            let html = pages::error_page(&viewer(&session), code);
            finish(
                &state,
                session,
                (StatusCode::INTERNAL_SERVER_ERROR, Html(html)),
            )
        }
    }
}

async fn not_found_handler(State(state): AppState, headers: HeaderMap, uri: Uri) -> Response {
    not_found(&state, &headers, &uri)
}

fn not_found(state: &PortalState, headers: &HeaderMap, uri: &Uri) -> Response {
    let session = state.sessions.load(headers);
    let html = pages::not_found_page(&viewer(&session), uri.path());
    (StatusCode::NOT_FOUND, Html(html)).into_response()
}
