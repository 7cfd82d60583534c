use crate::AppState;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
    response::Redirect,
};
use axum_extra::extract::CookieJar;
use password_hash::SaltString;
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "session_id";

// ── Passwords ──────────────────────────────────────────────────────────────

/// Hash a password with Argon2id and a fresh random salt.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {e}"))?;
    Ok(hash.to_string())
}

/// Check a password against a stored PHC hash string. Malformed hashes
/// never verify.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

// ── Session Store ──────────────────────────────────────────────────────────

/// Published whenever a session starts or ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn { user_id: String },
    SignedOut { user_id: String },
}

struct Session {
    user_id: String,
    created_at: Instant,
}

/// In-memory session store. Each entry maps a session token (UUID) to the
/// signed-in user and the instant it was created. Tokens expire after
/// `session_duration`.
///
/// Session changes are broadcast; call [`SessionStore::subscribe`] to listen
/// and drop the receiver to unsubscribe.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    events: broadcast::Sender<SessionEvent>,
    pub session_duration: Duration,
}

impl SessionStore {
    pub fn new(session_duration_hours: u64) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            sessions: RwLock::new(HashMap::new()),
            events,
            session_duration: Duration::from_secs(session_duration_hours * 3600),
        }
    }

    /// Create a new session for `user_id` and return its token.
    pub async fn create(&self, user_id: &str) -> String {
        let token = Uuid::new_v4().to_string();
        let mut sessions = self.sessions.write().await;
        // Opportunistically prune expired sessions on every login
        sessions.retain(|_, s| s.created_at.elapsed() < self.session_duration);
        sessions.insert(
            token.clone(),
            Session {
                user_id: user_id.to_owned(),
                created_at: Instant::now(),
            },
        );
        drop(sessions);

        let _ = self.events.send(SessionEvent::SignedIn {
            user_id: user_id.to_owned(),
        });
        token
    }

    /// Return the signed-in user id if the token exists and has not expired.
    pub async fn user_id(&self, token: &str) -> Option<String> {
        let sessions = self.sessions.read().await;
        sessions
            .get(token)
            .filter(|s| s.created_at.elapsed() < self.session_duration)
            .map(|s| s.user_id.clone())
    }

    /// Invalidate a specific session (sign-out).
    pub async fn remove(&self, token: &str) {
        let removed = self.sessions.write().await.remove(token);
        if let Some(session) = removed {
            let _ = self.events.send(SessionEvent::SignedOut {
                user_id: session.user_id,
            });
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

// ── AuthUser extractor ─────────────────────────────────────────────────────

/// Extractor that enforces authentication on any handler that includes it as
/// a parameter. If the request carries a valid `session_id` cookie the
/// extractor yields the signed-in user id; otherwise it short-circuits with a
/// redirect to the sign-in page so the handler never runs.
pub struct AuthUser {
    pub user_id: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    Arc<AppState>: FromRef<S>,
{
    type Rejection = Redirect;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = Arc::<AppState>::from_ref(state);
        let jar = CookieJar::from_headers(&parts.headers);

        let user_id = match jar.get(SESSION_COOKIE) {
            Some(cookie) => state.sessions.user_id(cookie.value()).await,
            None => None,
        };

        match user_id {
            Some(user_id) => Ok(AuthUser { user_id }),
            None => Err(Redirect::to("/auth")),
        }
    }
}
