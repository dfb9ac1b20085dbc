use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Defines the routes accessible to any user who has successfully passed the
/// session gate. This module implements the write side of the application:
/// profile management and bucketlist building.
///
/// Access Control Strategy:
/// Every handler in this module relies on the `CurrentUser` extractor
/// middleware being present on the router layer above this module. This
/// guarantees that all handlers receive a validated `CurrentUser` struct
/// containing the actor's ID and session token, which is then used for all
/// owner-only authorization checks (e.g., in `add_country` and
/// `complete_country`).
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // --- Profile Management ---
        // GET/POST /users/profile
        // GET returns the current profile values for the edit form; POST applies
        // the update after re-authenticating with the submitted password.
        .route(
            "/users/profile",
            get(handlers::profile_form).post(handlers::edit_profile),
        )
        // POST /users/delete
        // Deletes the acting user's account. Sessions, bucketlists and their
        // countries go with the row via cascade.
        .route("/users/delete", post(handlers::delete_account))
        // --- Bucketlist Building ---
        // POST /bucketlists/add
        // Creates a bucketlist owned by the acting user. Names are unique per
        // owner; duplicates answer 409.
        .route("/bucketlists/add", post(handlers::add_bucketlist))
        // GET/POST /bucketlists/{country_name}/add-country
        // GET returns the actor's bucketlists for the select control; POST adds
        // the country to the chosen list. Ownership of the chosen list is
        // enforced in the handler, and duplicate memberships answer 409.
        .route(
            "/bucketlists/{country_name}/add-country",
            get(handlers::add_country_form).post(handlers::add_country),
        )
        // POST /bucketlists/country/{country_name}/complete
        // Flips a country's completed flag on one of the actor's own lists,
        // addressed by bucketlist name in the body.
        .route(
            "/bucketlists/country/{country_name}/complete",
            post(handlers::complete_country),
        )
}
