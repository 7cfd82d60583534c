use crate::{
    auth::{self, SESSION_COOKIE},
    db,
    forms::{normalize_email, SignInForm, SignUpForm},
    handlers::is_unique_violation,
    AppState,
};
use askama::Template;
use axum::{
    extract::{Form, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::{
    cookie::{Cookie, SameSite},
    CookieJar,
};
use std::sync::Arc;

// ── Template structs ───────────────────────────────────────────────────────

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    signed_in: bool,
}

#[derive(Template)]
#[template(path = "auth.html")]
struct AuthTemplate {
    error: Option<String>,
    email: String,
}

impl AuthTemplate {
    fn with_error(email: &str, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            email: email.to_owned(),
        }
    }
}

// ── Handlers ───────────────────────────────────────────────────────────────

/// GET /
pub async fn index(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let signed_in = signed_in_user(&state, &jar).await.is_some();
    IndexTemplate { signed_in }.into_response()
}

/// GET /auth
pub async fn auth_page(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    // Already signed in: skip the form.
    if signed_in_user(&state, &jar).await.is_some() {
        return Redirect::to("/dashboard").into_response();
    }
    AuthTemplate {
        error: None,
        email: String::new(),
    }
    .into_response()
}

/// POST /auth/sign-in
pub async fn sign_in(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<SignInForm>,
) -> Response {
    let email = normalize_email(&form.email);

    let user = match db::find_user_by_email(&state.db, &email).await {
        Ok(user) => user,
        Err(e) => {
            tracing::error!("Failed to look up user: {:?}", e);
            return AuthTemplate::with_error(&email, "Sign-in is unavailable right now.")
                .into_response();
        }
    };

    let user = match user {
        Some(user) if auth::verify_password(&form.password, &user.password_hash) => user,
        _ => {
            // Use a small artificial delay to blunt brute-force attempts.
            tokio::time::sleep(std::time::Duration::from_millis(500)).await;
            return AuthTemplate::with_error(&email, "Incorrect email or password.")
                .into_response();
        }
    };

    start_session(&state, jar, &user.id).await
}

/// POST /auth/sign-up
pub async fn sign_up(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<SignUpForm>,
) -> Response {
    let sign_up = match form.validate() {
        Ok(s) => s,
        Err(e) => return AuthTemplate::with_error(&form.email, e.to_string()).into_response(),
    };

    let password_hash = match auth::hash_password(&sign_up.password) {
        Ok(h) => h,
        Err(e) => {
            tracing::error!("Failed to hash password: {:?}", e);
            return AuthTemplate::with_error(&sign_up.email, "Sign-up is unavailable right now.")
                .into_response();
        }
    };

    let user = match db::create_account(
        &state.db,
        &sign_up.email,
        &password_hash,
        sign_up.kind,
        &sign_up.organization,
        sign_up.website.as_deref(),
    )
    .await
    {
        Ok(user) => user,
        Err(e) if is_unique_violation(&e) => {
            return AuthTemplate::with_error(
                &sign_up.email,
                "An account with that email already exists.",
            )
            .into_response();
        }
        Err(e) => {
            tracing::error!("Failed to create account: {:?}", e);
            return AuthTemplate::with_error(&sign_up.email, "Sign-up is unavailable right now.")
                .into_response();
        }
    };

    tracing::info!(user_id = %user.id, kind = ?sign_up.kind, "Account created");
    start_session(&state, jar, &user.id).await
}

/// GET /auth/sign-out
pub async fn sign_out(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        state.sessions.remove(cookie.value()).await;
    }

    let removal = Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .max_age(time::Duration::seconds(0))
        .build();

    (jar.add(removal), Redirect::to("/auth")).into_response()
}

// ── Private helpers ────────────────────────────────────────────────────────

async fn signed_in_user(state: &AppState, jar: &CookieJar) -> Option<String> {
    match jar.get(SESSION_COOKIE) {
        Some(cookie) => state.sessions.user_id(cookie.value()).await,
        None => None,
    }
}

async fn start_session(state: &AppState, jar: CookieJar, user_id: &str) -> Response {
    let token = state.sessions.create(user_id).await;

    let cookie = Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(
            state.config.session_duration_hours as i64 * 3600,
        ))
        .build();

    (jar.add(cookie), Redirect::to("/dashboard")).into_response()
}
