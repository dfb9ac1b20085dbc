use crate::{
    AppState,
    auth::{self, CurrentUser},
    countries,
    error::{ApiError, conflict_or},
    models::{
        ActorView, AddCountryPage, AddCountryRequest, AuthResponse, BucketlistChoice,
        BucketlistCreated, BucketlistDetail, CompleteCountryRequest, CountryProfile,
        DEFAULT_HEADER_IMAGE_URL, DEFAULT_IMAGE_URL, EntryPage, FlashMessage, LoginRequest,
        NewBucketlistRequest, NewUser, Notice, OwnershipStatus, ProfileUpdate,
        ProfileUpdateRequest, RedirectTarget, SignupRequest, ToggleResult, User, UserDetail,
        UserIndex,
    },
    repository::RepositoryState,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use serde::Deserialize;

// --- Filter Structs ---

/// UserFilter
///
/// Accepted query parameters for the user directory (GET /users).
#[derive(Deserialize, utoipa::IntoParams)]
pub struct UserFilter {
    /// Optional username substring to filter the directory by.
    pub q: Option<String>,
}

/// CountryQuery
///
/// Accepted query parameters for the country lookup (GET /country).
#[derive(Deserialize, utoipa::IntoParams)]
pub struct CountryQuery {
    /// Free-text country name to resolve against the directory.
    pub country: String,
}

// --- Flash Helpers ---

/// Drains the pending notices for the acting session, if any. A drain
/// failure must not take the page down with it; the notices are lost and the
/// failure is logged.
async fn drain_flashes(repo: &RepositoryState, user: Option<&CurrentUser>) -> Vec<FlashMessage> {
    let Some(actor) = user else {
        return Vec::new();
    };
    match repo.drain_flashes(&actor.token).await {
        Ok(flashes) => flashes,
        Err(e) => {
            tracing::error!("flash drain failed: {:?}", e);
            Vec::new()
        }
    }
}

/// Queues a one-shot notice on the session. Best-effort: losing a notice is
/// logged but never fails the request that produced it.
async fn queue_flash(repo: &RepositoryState, token: &str, flash: FlashMessage) {
    if let Err(e) = repo.push_flash(token, flash).await {
        tracing::error!("flash queue failed: {:?}", e);
    }
}

// --- Entry & Country Handlers ---

/// entry_page
///
/// [Public Route] The country-search entry page payload. Most redirect flows
/// land here, so this is the primary drain point for pending flash notices.
#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Entry page payload", body = EntryPage))
)]
pub async fn entry_page(
    user: Option<CurrentUser>,
    State(state): State<AppState>,
) -> Json<EntryPage> {
    let flashes = drain_flashes(&state.repo, user.as_ref()).await;

    Json(EntryPage {
        user: user.map(|actor| ActorView {
            id: actor.id,
            username: actor.username,
        }),
        flashes,
    })
}

/// country_info
///
/// [Public Route] Resolves a country name against the external directory and
/// merges in a header image from the image search.
///
/// *Failure modes*: an unknown name answers 404 with a redirect to the entry
/// page (and, for a logged-in actor, an informational notice on the flash
/// queue). An image search failure is absorbed; the metadata still renders
/// over the default banner.
#[utoipa::path(
    get,
    path = "/country",
    params(CountryQuery),
    responses(
        (status = 200, description = "Merged country profile", body = CountryProfile),
        (status = 404, description = "Country not found")
    )
)]
pub async fn country_info(
    user: Option<CurrentUser>,
    State(state): State<AppState>,
    Query(query): Query<CountryQuery>,
) -> Result<Json<CountryProfile>, ApiError> {
    match countries::country_profile(&state.directory, &state.images, &query.country).await {
        Ok(profile) => Ok(Json(profile)),
        Err(ApiError::CountryNotFound) => {
            if let Some(actor) = user.as_ref() {
                queue_flash(
                    &state.repo,
                    &actor.token,
                    FlashMessage::info("Country not found"),
                )
                .await;
            }
            Err(ApiError::CountryNotFound)
        }
        Err(e) => Err(e),
    }
}

// --- Signup / Login / Logout ---

/// signup
///
/// [Public Route] Creates an account and logs the new user straight in.
///
/// *Flow*: validate the form rules, replace any live session (signing up
/// while logged in logs the old identity out), hash the password, insert,
/// mint a session. A taken username surfaces as 409 "Username already
/// taken"; the unique index on `users.username` is the guard of record.
#[utoipa::path(
    post,
    path = "/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created and logged in", body = AuthResponse),
        (status = 400, description = "Validation failure"),
        (status = 409, description = "Username already taken")
    )
)]
pub async fn signup(
    user: Option<CurrentUser>,
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<impl IntoResponse + std::fmt::Debug, ApiError> {
    payload.validate()?;

    if let Some(actor) = user {
        auth::end_session(&state.repo, &actor.token).await?;
    }

    let image_url = payload
        .image_url
        .filter(|url| !url.is_empty())
        .unwrap_or_else(|| DEFAULT_IMAGE_URL.to_string());
    let password_hash = auth::hash_password(&payload.password)?;

    let created = state
        .repo
        .create_user(NewUser {
            username: payload.username,
            email: payload.email,
            password_hash,
            image_url,
        })
        .await
        .map_err(|e| conflict_or(e, "Username already taken"))?;

    tracing::info!(user_id = created.id, "new account registered");

    let token = auth::start_session(&state.repo, created.id).await?;
    let redirect = format!("/users/{}", created.id);

    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, auth::session_cookie(&token))],
        Json(AuthResponse {
            user: created,
            redirect,
        }),
    ))
}

/// login
///
/// [Public Route] Verifies credentials and mints a session.
///
/// *Note*: an unknown username and a wrong password answer identically
/// ("Invalid credentials.", 401); the success greeting rides the flash queue
/// so it shows after the redirect to the entry page.
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse + std::fmt::Debug, ApiError> {
    payload.validate()?;

    let user = match state.repo.get_user_by_username(&payload.username).await? {
        Some(user) if auth::verify_password(&payload.password, &user.password_hash) => user,
        _ => return Err(ApiError::BadCredentials("Invalid credentials.".to_string())),
    };

    let token = auth::start_session(&state.repo, user.id).await?;
    queue_flash(
        &state.repo,
        &token,
        FlashMessage::success(format!("Hello, {}!", user.username)),
    )
    .await;

    Ok((
        [(header::SET_COOKIE, auth::session_cookie(&token))],
        Json(AuthResponse {
            user,
            redirect: "/".to_string(),
        }),
    ))
}

/// logout
///
/// [Public Route] Drops the session row and expires the cookie. Safe to call
/// without a session; logout is idempotent. The farewell notice rides the
/// body because there is no session left to flash through.
#[utoipa::path(
    post,
    path = "/logout",
    responses((status = 200, description = "Logged out", body = Notice))
)]
pub async fn logout(
    user: Option<CurrentUser>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(actor) = user {
        auth::end_session(&state.repo, &actor.token).await?;
    }

    Ok((
        [(header::SET_COOKIE, auth::clear_session_cookie())],
        Json(Notice {
            message: "You have successfully logged out.".to_string(),
            redirect: "/login".to_string(),
        }),
    ))
}

// --- User Handlers ---

/// list_users
///
/// [Public Route] The user directory, optionally filtered by a username
/// substring via the `q` query parameter. An empty `q` lists everyone.
#[utoipa::path(
    get,
    path = "/users",
    params(UserFilter),
    responses((status = 200, description = "User directory", body = UserIndex))
)]
pub async fn list_users(
    user: Option<CurrentUser>,
    State(state): State<AppState>,
    Query(filter): Query<UserFilter>,
) -> Result<Json<UserIndex>, ApiError> {
    let search = filter.q.filter(|q| !q.is_empty());
    let users = state.repo.list_users(search).await?;
    let flashes = drain_flashes(&state.repo, user.as_ref()).await;

    Ok(Json(UserIndex { users, flashes }))
}

/// user_detail
///
/// [Public Route] A user's profile page payload: the profile plus the
/// bucketlists they own.
#[utoipa::path(
    get,
    path = "/users/{id}",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "Profile with owned bucketlists", body = UserDetail),
        (status = 404, description = "Not Found")
    )
)]
pub async fn user_detail(
    actor: Option<CurrentUser>,
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<UserDetail>, ApiError> {
    let user = state
        .repo
        .get_user(user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let bucketlists = state.repo.bucketlists_for_user(user_id).await?;
    let flashes = drain_flashes(&state.repo, actor.as_ref()).await;

    Ok(Json(UserDetail {
        user,
        bucketlists,
        flashes,
    }))
}

/// profile_form
///
/// [Authenticated Route] Current profile values for the edit form.
#[utoipa::path(
    get,
    path = "/users/profile",
    responses((status = 200, description = "Current profile", body = User))
)]
pub async fn profile_form(
    CurrentUser { id, .. }: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<User>, ApiError> {
    state
        .repo
        .get_user(id)
        .await?
        .map(Json)
        .ok_or(ApiError::Unauthorized)
}

/// edit_profile
///
/// [Authenticated Route] Applies a full profile update.
///
/// *Re-authentication*: the submitted password is checked against the stored
/// hash before anything changes; it is a gate, not a password change. Empty
/// image fields fall back to the defaults, and renaming onto a taken
/// username answers 409.
#[utoipa::path(
    post,
    path = "/users/profile",
    request_body = ProfileUpdateRequest,
    responses(
        (status = 200, description = "Profile updated", body = AuthResponse),
        (status = 401, description = "Wrong password"),
        (status = 409, description = "Username already taken")
    )
)]
pub async fn edit_profile(
    CurrentUser { id, .. }: CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<ProfileUpdateRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    payload.validate()?;

    let current = state
        .repo
        .get_user(id)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    if !auth::verify_password(&payload.password, &current.password_hash) {
        return Err(ApiError::BadCredentials(
            "Wrong password, please try again.".to_string(),
        ));
    }

    let update = ProfileUpdate {
        username: payload.username,
        email: payload.email,
        image_url: payload
            .image_url
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| DEFAULT_IMAGE_URL.to_string()),
        header_image_url: payload
            .header_image_url
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| DEFAULT_HEADER_IMAGE_URL.to_string()),
        bio: payload.bio,
        location: payload.location,
    };

    let updated = state
        .repo
        .update_profile(id, update)
        .await
        .map_err(|e| conflict_or(e, "Username already taken"))?
        .ok_or(ApiError::Unauthorized)?;

    let redirect = format!("/users/{}", updated.id);
    Ok(Json(AuthResponse {
        user: updated,
        redirect,
    }))
}

/// delete_account
///
/// [Authenticated Route] Deletes the acting user. Sessions, bucketlists and
/// their countries go with the row via cascade; the cookie is expired in the
/// same response.
#[utoipa::path(
    post,
    path = "/users/delete",
    responses((status = 200, description = "Account deleted", body = RedirectTarget))
)]
pub async fn delete_account(
    CurrentUser { id, .. }: CurrentUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    state.repo.delete_user(id).await?;
    tracing::info!(user_id = id, "account deleted");

    Ok((
        [(header::SET_COOKIE, auth::clear_session_cookie())],
        Json(RedirectTarget {
            redirect: "/signup".to_string(),
        }),
    ))
}

/// validate_access
///
/// [Public Route] The ownership probe the bucketlist page polls before
/// allowing completion toggles. The HTTP status is 200 either way; the
/// verdict rides in the body so the frontend reads one field. Anonymous
/// actors are non-owners by definition.
#[utoipa::path(
    get,
    path = "/users/{bucketlist_name}/validate",
    params(("bucketlist_name" = String, Path, description = "Bucketlist name")),
    responses((status = 200, description = "Ownership verdict", body = OwnershipStatus))
)]
pub async fn validate_access(
    user: Option<CurrentUser>,
    State(state): State<AppState>,
    Path(bucketlist_name): Path<String>,
) -> Result<Json<OwnershipStatus>, ApiError> {
    let owns = match user {
        Some(actor) => state
            .repo
            .get_bucketlist_by_name(actor.id, &bucketlist_name)
            .await?
            .is_some(),
        None => false,
    };

    Ok(Json(OwnershipStatus {
        status: if owns { 200 } else { 403 },
    }))
}

// --- Bucketlist Handlers ---

/// add_bucketlist
///
/// [Authenticated Route] Creates a bucketlist owned by the acting user.
/// Names are unique per owner; a duplicate answers 409 and the unique index
/// on (user_id, name) closes the race.
#[utoipa::path(
    post,
    path = "/bucketlists/add",
    request_body = NewBucketlistRequest,
    responses(
        (status = 201, description = "Bucketlist created", body = BucketlistCreated),
        (status = 400, description = "Validation failure"),
        (status = 409, description = "Duplicate name for this owner")
    )
)]
pub async fn add_bucketlist(
    CurrentUser { id, .. }: CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<NewBucketlistRequest>,
) -> Result<impl IntoResponse + std::fmt::Debug, ApiError> {
    payload.validate()?;

    let bucketlist = state
        .repo
        .create_bucketlist(id, &payload.name, &payload.description)
        .await
        .map_err(|e| {
            conflict_or(
                e,
                format!("Bucketlist with name {} already exists", payload.name),
            )
        })?;

    let redirect = format!("/users/{id}");
    Ok((
        StatusCode::CREATED,
        Json(BucketlistCreated {
            bucketlist,
            redirect,
        }),
    ))
}

/// bucketlist_detail
///
/// [Public Route] A bucketlist page payload: the list plus its member
/// countries.
#[utoipa::path(
    get,
    path = "/bucketlists/{id}",
    params(("id" = i64, Path, description = "Bucketlist ID")),
    responses(
        (status = 200, description = "Bucketlist with its countries", body = BucketlistDetail),
        (status = 404, description = "Not Found")
    )
)]
pub async fn bucketlist_detail(
    actor: Option<CurrentUser>,
    State(state): State<AppState>,
    Path(bucketlist_id): Path<i64>,
) -> Result<Json<BucketlistDetail>, ApiError> {
    let bucketlist = state
        .repo
        .get_bucketlist(bucketlist_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Bucketlist not found".to_string()))?;

    let countries = state.repo.countries_in_bucketlist(bucketlist_id).await?;
    let flashes = drain_flashes(&state.repo, actor.as_ref()).await;

    Ok(Json(BucketlistDetail {
        bucketlist,
        countries,
        flashes,
    }))
}

/// add_country_form
///
/// [Authenticated Route] The add-country form payload: the country being
/// added plus the actor's bucketlists for the select control.
#[utoipa::path(
    get,
    path = "/bucketlists/{country_name}/add-country",
    params(("country_name" = String, Path, description = "Country to add")),
    responses((status = 200, description = "Selectable bucketlists", body = AddCountryPage))
)]
pub async fn add_country_form(
    CurrentUser { id, .. }: CurrentUser,
    State(state): State<AppState>,
    Path(country_name): Path<String>,
) -> Result<Json<AddCountryPage>, ApiError> {
    let bucketlists = state
        .repo
        .bucketlists_for_user(id)
        .await?
        .into_iter()
        .map(|list| BucketlistChoice {
            id: list.id,
            name: list.name,
        })
        .collect();

    Ok(Json(AddCountryPage {
        country_name,
        bucketlists,
    }))
}

/// add_country
///
/// [Authenticated Route] Adds a country to one of the actor's bucketlists.
///
/// *Dedupe*: a membership pre-check answers the common duplicate case with
/// 409 and a queued notice; the unique index on (bucketlist_id,
/// country_name) is the guard of record, so a lost race surfaces as the
/// same conflict. The chosen list must belong to the actor.
#[utoipa::path(
    post,
    path = "/bucketlists/{country_name}/add-country",
    params(("country_name" = String, Path, description = "Country to add")),
    request_body = AddCountryRequest,
    responses(
        (status = 200, description = "Country added", body = RedirectTarget),
        (status = 403, description = "Not the owner of the chosen bucketlist"),
        (status = 409, description = "Country already in the bucketlist")
    )
)]
pub async fn add_country(
    actor: CurrentUser,
    State(state): State<AppState>,
    Path(country_name): Path<String>,
    Json(payload): Json<AddCountryRequest>,
) -> Result<Json<RedirectTarget>, ApiError> {
    if !state
        .repo
        .user_owns_bucketlist(actor.id, payload.bucketlist_id)
        .await?
    {
        return Err(ApiError::Forbidden("Access unauthorized.".to_string()));
    }

    let duplicate_notice = format!("Country {country_name} is already in bucketlist");

    if state
        .repo
        .find_country(payload.bucketlist_id, &country_name)
        .await?
        .is_some()
    {
        queue_flash(
            &state.repo,
            &actor.token,
            FlashMessage::danger(duplicate_notice.clone()),
        )
        .await;
        return Err(ApiError::Conflict(duplicate_notice));
    }

    match state
        .repo
        .add_country(payload.bucketlist_id, &country_name)
        .await
    {
        Ok(_) => {
            queue_flash(
                &state.repo,
                &actor.token,
                FlashMessage::success(format!("Country {country_name} added to bucketlist")),
            )
            .await;
            Ok(Json(RedirectTarget {
                redirect: "/".to_string(),
            }))
        }
        Err(e) => {
            // A lost check-then-insert race lands on the unique index and
            // surfaces exactly like the pre-check hit.
            let err = conflict_or(e, duplicate_notice.clone());
            if matches!(err, ApiError::Conflict(_)) {
                queue_flash(
                    &state.repo,
                    &actor.token,
                    FlashMessage::danger(duplicate_notice),
                )
                .await;
            }
            Err(err)
        }
    }
}

/// complete_country
///
/// [Authenticated Route] Flips a country's completed flag. The bucketlist is
/// addressed by name within the acting user's own lists, so one user cannot
/// toggle entries on another's identically-named list.
#[utoipa::path(
    post,
    path = "/bucketlists/country/{country_name}/complete",
    params(("country_name" = String, Path, description = "Country to toggle")),
    request_body = CompleteCountryRequest,
    responses(
        (status = 200, description = "Flag updated", body = ToggleResult),
        (status = 404, description = "No such bucketlist or membership")
    )
)]
pub async fn complete_country(
    CurrentUser { id, .. }: CurrentUser,
    State(state): State<AppState>,
    Path(country_name): Path<String>,
    Json(payload): Json<CompleteCountryRequest>,
) -> Result<Json<ToggleResult>, ApiError> {
    let bucketlist = state
        .repo
        .get_bucketlist_by_name(id, &payload.bucketlist_name)
        .await?
        .ok_or_else(|| ApiError::NotFound("Bucketlist not found".to_string()))?;

    let updated = state
        .repo
        .set_country_completed(bucketlist.id, &country_name, payload.completed)
        .await?;
    if !updated {
        return Err(ApiError::NotFound("Country not in bucketlist".to_string()));
    }

    Ok(Json(ToggleResult {
        result: "success".to_string(),
    }))
}
