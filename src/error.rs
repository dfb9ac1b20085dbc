use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// ApiError
///
/// The application-wide error taxonomy. Every fallible layer (repository,
/// external clients, handlers) converges on this enum so the HTTP mapping
/// lives in exactly one place.
///
/// User-facing classes carry their display text; infrastructure classes
/// (`Database`, `Upstream`, `Internal`) are logged in full and answered
/// with a generic body so internals never leak to clients.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Form input failed validation. Message lists the offending fields.
    #[error("{0}")]
    Validation(String),

    /// The request needs an authenticated actor and none was resolved.
    /// Rendered with a redirect hint to the entry page.
    #[error("Access unauthorized.")]
    Unauthorized,

    /// A supplied password did not check out (login, profile re-auth).
    /// Unlike `Unauthorized` there is no redirect; the client re-presents
    /// its form with the message inline.
    #[error("{0}")]
    BadCredentials(String),

    /// The actor is authenticated but not permitted (e.g. not the owner).
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// The country directory had no match. A soft failure: the response
    /// carries an informational notice plus a redirect to the entry page
    /// instead of a bare 404.
    #[error("Country not found")]
    CountryNotFound,

    /// A uniqueness rule rejected the write (duplicate username, duplicate
    /// bucketlist name per owner, duplicate country per bucketlist).
    #[error("{0}")]
    Conflict(String),

    /// An external service failed in a way that is not "no match".
    #[error("external service error: {0}")]
    Upstream(String),

    #[error("database error")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized | ApiError::BadCredentials(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) | ApiError::CountryNotFound => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Infrastructure failures keep their detail in the logs only.
        let body = match &self {
            ApiError::Database(err) => {
                tracing::error!("database error: {err:?}");
                json!({ "error": "internal server error" })
            }
            ApiError::Internal(msg) => {
                tracing::error!("internal error: {msg}");
                json!({ "error": "internal server error" })
            }
            ApiError::Upstream(detail) => {
                tracing::error!("upstream failure: {detail}");
                json!({ "error": "external service error" })
            }
            ApiError::Unauthorized => {
                json!({ "error": self.to_string(), "redirect": "/" })
            }
            ApiError::CountryNotFound => {
                json!({ "error": self.to_string(), "redirect": "/" })
            }
            _ => json!({ "error": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Upstream(err.to_string())
    }
}

/// Translates a unique-constraint rejection into the user-facing Conflict
/// for the insert that hit it; anything else stays a database error.
///
/// Callers may pre-check for friendlier flow, but a lost check-then-insert
/// race still lands here and surfaces as the same conflict notice.
pub fn conflict_or(err: sqlx::Error, message: impl Into<String>) -> ApiError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => ApiError::Conflict(message.into()),
        _ => ApiError::Database(err),
    }
}
