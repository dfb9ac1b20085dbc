use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;

use crate::error::ApiError;

/// Fallback avatar applied when signup or a profile edit leaves image_url empty.
pub const DEFAULT_IMAGE_URL: &str = "/static/images/default-pic.png";
/// Fallback banner, shared by profile headers and country pages whose image
/// search produced nothing.
pub const DEFAULT_HEADER_IMAGE_URL: &str = "/static/images/travel-default.webp";

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// Canonical identity record from the `users` table. The password hash is an
/// argon2 PHC string and is never serialized into responses.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    pub id: i64,
    // Unique handle; signup conflicts fire on this column.
    pub username: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    #[ts(skip)]
    pub password_hash: String,
    pub image_url: String,
    pub header_image_url: String,
    pub bio: Option<String>,
    pub location: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Bucketlist
///
/// A named, user-owned collection of countries. (user_id, name) is unique:
/// one user cannot hold two bucketlists with the same name, but two users may
/// each own a "Summer 2026".
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Bucketlist {
    pub id: i64,
    pub name: String,
    pub description: String,
    // FK to users.id (owner); deleting the owner cascades here.
    pub user_id: i64,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// BucketlistCountry
///
/// One country's membership inside one bucketlist. country_name is the
/// external directory identifier, not a foreign key; (bucketlist_id,
/// country_name) is unique so a country appears at most once per list.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct BucketlistCountry {
    pub id: i64,
    pub country_name: String,
    pub completed: bool,
    pub bucketlist_id: i64,
}

/// Session
///
/// Raw database row (internal use). Clients only ever see the opaque token,
/// carried by the session cookie.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub token: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

// --- Flash Notices ---

/// Notice severities matching the styling classes the frontend knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum FlashLevel {
    Success,
    Danger,
    #[default]
    Info,
}

/// FlashMessage
///
/// A one-shot notice queued on the session and delivered with the next
/// page-like GET, then discarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct FlashMessage {
    pub level: FlashLevel,
    pub message: String,
}

impl FlashMessage {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Success,
            message: message.into(),
        }
    }

    pub fn danger(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Danger,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Info,
            message: message.into(),
        }
    }
}

// --- Request Payloads (Input Schemas) ---

/// SignupRequest
///
/// Input payload for the public registration endpoint (POST /signup).
/// Field rules mirror the registration form: username 1-20 characters,
/// password 6-55, email structurally valid and at most 50 characters,
/// image_url optional (empty falls back to the default avatar).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct SignupRequest {
    pub username: String,
    pub password: String,
    pub email: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl SignupRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = Vec::new();
        check_length(&mut errors, "username", &self.username, 1, 20);
        check_length(&mut errors, "password", &self.password, 6, 55);
        check_email(&mut errors, &self.email);
        collect(errors)
    }
}

/// LoginRequest
///
/// Input payload for POST /login.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = Vec::new();
        check_length(&mut errors, "username", &self.username, 1, 20);
        check_length(&mut errors, "password", &self.password, 6, 55);
        collect(errors)
    }
}

/// ProfileUpdateRequest
///
/// Input payload for POST /users/profile. The password field re-authenticates
/// the actor; it is not a password change. Empty image fields fall back to
/// the defaults, exactly as on signup.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ProfileUpdateRequest {
    pub username: String,
    pub password: String,
    pub email: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub header_image_url: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

impl ProfileUpdateRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = Vec::new();
        check_length(&mut errors, "username", &self.username, 1, 20);
        check_length(&mut errors, "password", &self.password, 6, 55);
        check_email(&mut errors, &self.email);
        collect(errors)
    }
}

/// NewBucketlistRequest
///
/// Input payload for POST /bucketlists/add: name 1-20 characters,
/// description 1-50.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct NewBucketlistRequest {
    pub name: String,
    pub description: String,
}

impl NewBucketlistRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = Vec::new();
        check_length(&mut errors, "name", &self.name, 1, 20);
        check_length(&mut errors, "description", &self.description, 1, 50);
        collect(errors)
    }
}

/// AddCountryRequest
///
/// Input payload for POST /bucketlists/{country_name}/add-country: the
/// bucketlist chosen from the actor's own lists.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AddCountryRequest {
    pub bucketlist_id: i64,
}

/// CompleteCountryRequest
///
/// JSON body of the completion toggle. The bucketlist is addressed by name
/// (resolved against the acting user) and the membership flag is set to
/// `completed`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CompleteCountryRequest {
    pub bucketlist_name: String,
    pub completed: bool,
}

// --- Repository Inputs (Internal) ---

/// Column values for a user insert; the handler has already hashed the
/// password and applied the avatar default.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub image_url: String,
}

/// Full profile update as applied to the row (defaults already resolved).
#[derive(Debug, Clone)]
pub struct ProfileUpdate {
    pub username: String,
    pub email: String,
    pub image_url: String,
    pub header_image_url: String,
    pub bio: Option<String>,
    pub location: Option<String>,
}

// --- Response Views (Output Schemas) ---

/// The authenticated actor as embedded in page payloads.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ActorView {
    pub id: i64,
    pub username: String,
}

/// EntryPage
///
/// Payload of GET / (the country-search entry page). Most redirects land
/// here, so it carries the pending flash notices.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct EntryPage {
    pub user: Option<ActorView>,
    pub flashes: Vec<FlashMessage>,
}

/// AuthResponse
///
/// Successful signup / login / profile-edit payload: the (re)authenticated
/// user plus where the client should navigate next.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AuthResponse {
    pub user: User,
    pub redirect: String,
}

/// A bare navigation target, for flows whose notice rides the flash queue.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RedirectTarget {
    pub redirect: String,
}

/// Successful bucketlist creation: the new list plus the owner's profile
/// page to navigate to.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct BucketlistCreated {
    pub bucketlist: Bucketlist,
    pub redirect: String,
}

/// Notice
///
/// Redirect plus an inline message, for flows that no longer have a session
/// to flash through (logout).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct Notice {
    pub message: String,
    pub redirect: String,
}

/// UserIndex
///
/// Payload of GET /users: the user directory, optionally filtered by the
/// `q` query parameter.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UserIndex {
    pub users: Vec<User>,
    pub flashes: Vec<FlashMessage>,
}

/// UserDetail
///
/// Payload of GET /users/{id}: profile plus owned bucketlists.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UserDetail {
    pub user: User,
    pub bucketlists: Vec<Bucketlist>,
    pub flashes: Vec<FlashMessage>,
}

/// BucketlistDetail
///
/// Payload of GET /bucketlists/{id}: the list plus its member countries.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct BucketlistDetail {
    pub bucketlist: Bucketlist,
    pub countries: Vec<BucketlistCountry>,
    pub flashes: Vec<FlashMessage>,
}

/// One selectable bucketlist in the add-country form payload.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct BucketlistChoice {
    pub id: i64,
    pub name: String,
}

/// AddCountryPage
///
/// GET payload of the add-country flow: the country being added plus the
/// actor's bucketlists for the select control.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AddCountryPage {
    pub country_name: String,
    pub bucketlists: Vec<BucketlistChoice>,
}

/// CountryProfile
///
/// The merged external view: directory metadata plus the header image chosen
/// by the image search (or the default banner when the search comes back
/// empty).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CountryProfile {
    pub name: String,
    pub capital: Option<String>,
    pub region: String,
    pub subregion: Option<String>,
    pub population: i64,
    // Flag image URL exactly as the directory serves it.
    pub flag: String,
    pub currencies: Vec<String>,
    pub languages: Vec<String>,
    pub header_image: String,
}

/// Body of the completion toggle endpoint: `{"result": "success"}`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ToggleResult {
    pub result: String,
}

/// OwnershipStatus
///
/// Body of the ownership probe. The HTTP status is 200 either way; the
/// verdict rides in the body (200 = owner, 403 = not the owner or anonymous).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct OwnershipStatus {
    pub status: u16,
}

// --- Validation Helpers ---

fn check_length(errors: &mut Vec<String>, field: &str, value: &str, min: usize, max: usize) {
    let len = value.chars().count();
    if len < min || len > max {
        errors.push(format!("{field} must be between {min} and {max} characters"));
    }
}

fn check_email(errors: &mut Vec<String>, email: &str) {
    if email.chars().count() > 50 {
        errors.push("email must be at most 50 characters".to_string());
    }
    let ok = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    };
    if !ok {
        errors.push("email must be a valid address".to_string());
    }
}

fn collect(errors: Vec<String>) -> Result<(), ApiError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation(errors.join("; ")))
    }
}
