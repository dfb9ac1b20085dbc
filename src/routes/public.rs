use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Defines endpoints that are **unauthenticated** and accessible to any
/// client (anonymous or logged-in). These cover the identity gateway
/// (signup/login/logout), the read-only browse pages, and the country
/// lookup backing the entry page search box.
///
/// Session awareness:
/// Several read handlers here still accept an *optional* session so they can
/// personalize their payload and drain pending flash notices for a
/// logged-in actor; absence of a session is never an error on this router.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // A simple, unauthenticated endpoint used for monitoring and load balancer checks.
        // Returns "ok" immediately to verify the service is running and responsive.
        .route("/health", get(|| async { "ok" }))
        // GET /
        // The entry page payload: the acting user (when logged in) plus any pending
        // flash notices. Redirect flows from login and add-country land here.
        .route("/", get(handlers::entry_page))
        // GET /country?country=...
        // Resolves a country name against the external directory and merges in a
        // header image from the image search. Unknown names answer 404.
        .route("/country", get(handlers::country_info))
        // --- Identity Gateway ---
        // POST /signup
        // Creates an account and logs the new user straight in, replacing any
        // session the client already held.
        .route("/signup", post(handlers::signup))
        // POST /login
        // Verifies credentials and mints a server-side session; the cookie rides
        // on the response.
        .route("/login", post(handlers::login))
        // POST /logout
        // Drops the session row and expires the cookie. Idempotent, so it lives on
        // the public router rather than behind the session gate.
        .route("/logout", post(handlers::logout))
        // --- Browse Pages ---
        // GET /users?q=...
        // The user directory, optionally filtered by a username substring.
        .route("/users", get(handlers::list_users))
        // GET /users/{id}
        // A user's profile page payload including the bucketlists they own.
        .route("/users/{id}", get(handlers::user_detail))
        // GET /users/{bucketlist_name}/validate
        // The ownership probe the bucketlist page polls before enabling its
        // completion toggles. Always answers 200; the verdict rides in the body.
        .route(
            "/users/{bucketlist_name}/validate",
            get(handlers::validate_access),
        )
        // GET /bucketlists/{id}
        // A bucketlist page payload including its member countries.
        .route("/bucketlists/{id}", get(handlers::bucketlist_detail))
}
