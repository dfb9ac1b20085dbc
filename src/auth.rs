use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    extract::{FromRef, FromRequestParts, OptionalFromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use chrono::{Duration, Utc};
use std::convert::Infallible;
use uuid::Uuid;

use crate::{error::ApiError, repository::RepositoryState};

/// Name of the session cookie issued on signup and login.
pub const SESSION_COOKIE: &str = "letsgotravel_session";

/// Sessions live for two weeks; the database row and the cookie expire
/// together.
pub const SESSION_TTL_DAYS: i64 = 14;

// --- Password Hashing ---

/// hash_password
///
/// Hashes a cleartext password into an argon2id PHC string for storage.
/// Salt generation uses the OS RNG; the PHC string carries everything
/// verification needs.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {e}")))
}

/// verify_password
///
/// Checks a cleartext password against the stored PHC string. A malformed
/// stored hash counts as a failed verification rather than an error; the
/// caller treats both the same way.
pub fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::error!("stored password hash is malformed: {e}");
            false
        }
    }
}

// --- Session Lifecycle ---

/// start_session
///
/// Mints a fresh opaque session token for the user and persists it with its
/// expiry. Returns the token so the handler can set the cookie.
pub async fn start_session(repo: &RepositoryState, user_id: i64) -> Result<String, ApiError> {
    let token = Uuid::new_v4().to_string();
    let expires_at = Utc::now() + Duration::days(SESSION_TTL_DAYS);
    repo.create_session(&token, user_id, expires_at).await?;
    Ok(token)
}

/// end_session
///
/// Removes the session row. A token that is already gone is not an error;
/// logout is idempotent.
pub async fn end_session(repo: &RepositoryState, token: &str) -> Result<(), ApiError> {
    if !repo.delete_session(token).await? {
        tracing::debug!("logout for a session that no longer exists");
    }
    Ok(())
}

/// session_cookie
///
/// Builds the Set-Cookie value issued on signup and login. HttpOnly keeps
/// the token away from scripts; SameSite=Lax covers the form-post flows.
pub fn session_cookie(token: &str) -> String {
    let max_age = SESSION_TTL_DAYS * 24 * 60 * 60;
    format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}")
}

/// clear_session_cookie
///
/// Builds the expired Set-Cookie value issued on logout and account
/// deletion.
pub fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// session_token
///
/// Pulls the session token out of the Cookie header, if any. The header may
/// carry several cookies; only ours matters here.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then(|| value.to_string())
    })
}

/// CurrentUser Extractor Result
///
/// The resolved identity of a request with a live session. Handlers use the
/// id for ownership checks and the token for flash queueing and logout.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
    /// The opaque session token the identity was resolved from.
    pub token: String,
}

/// CurrentUser Extractor Implementation
///
/// Implements Axum's FromRequestParts trait, making CurrentUser usable as a
/// function argument in any authenticated handler. Authentication stays in
/// the extractor; business logic stays in the handler.
///
/// The process:
/// 1. Dependency Resolution: Accessing the Repository from the application state.
/// 2. Cookie Extraction: Pulling the session token from the Cookie header.
/// 3. DB Lookup: Resolving the token to a live (unexpired) session and its user.
///
/// Rejection: ApiError::Unauthorized (401 plus a redirect to "/") when the
/// cookie is missing, unknown, or expired.
impl<S> FromRequestParts<S> for CurrentUser
where
    // S must allow sending across threads and sharing.
    S: Send + Sync,
    // Allows the extractor to pull the Repository State from the app state.
    RepositoryState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);

        let token = session_token(&parts.headers).ok_or(ApiError::Unauthorized)?;

        // The join ignores expired rows, so a stale cookie lands here too.
        let user = repo
            .session_user(&token)
            .await?
            .ok_or(ApiError::Unauthorized)?;

        Ok(CurrentUser {
            id: user.id,
            username: user.username,
            token,
        })
    }
}

/// Optional CurrentUser Extractor
///
/// Lets mixed-audience pages (the entry page, public profiles) take
/// `Option<CurrentUser>`: anonymous requests flow through as None instead of
/// being rejected. A database failure during resolution is logged and also
/// degrades to None; those pages render fine without an actor.
impl<S> OptionalFromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);

        let Some(token) = session_token(&parts.headers) else {
            return Ok(None);
        };

        match repo.session_user(&token).await {
            Ok(Some(user)) => Ok(Some(CurrentUser {
                id: user.id,
                username: user.username,
                token,
            })),
            Ok(None) => Ok(None),
            Err(e) => {
                tracing::error!("session resolution failed: {:?}", e);
                Ok(None)
            }
        }
    }
}
