use crate::models::{
    Bucketlist, BucketlistCountry, FlashMessage, NewUser, ProfileUpdate, User,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{query_builder::QueryBuilder, SqlitePool};
use std::sync::Arc;

const USER_COLUMNS: &str =
    "id, username, email, password_hash, image_url, header_image_url, bio, location, created_at";
const BUCKETLIST_COLUMNS: &str = "id, name, description, user_id, created_at";
const COUNTRY_COLUMNS: &str = "id, country_name, completed, bucketlist_id";

/// Repository Trait
///
/// Defines the abstract contract for all persistence operations. This is the
/// core of the Repository Abstraction pattern, allowing the handlers to
/// interact with the data layer without knowing the specific implementation
/// (SQLite, Mock, etc.).
///
/// Errors are propagated rather than swallowed so that callers can translate
/// unique-constraint violations into their domain conflicts (duplicate
/// username, duplicate bucketlist name, duplicate country membership).
///
/// **Send + Sync + async_trait** are required to make the trait object
/// (`Arc<dyn Repository>`) safely shareable across Axum's task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    // Insert fails with a unique violation when the username is taken.
    async fn create_user(&self, user: NewUser) -> Result<User, sqlx::Error>;
    async fn get_user(&self, id: i64) -> Result<Option<User>, sqlx::Error>;
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, sqlx::Error>;
    // Directory listing with optional substring filter on the username.
    async fn list_users(&self, search: Option<String>) -> Result<Vec<User>, sqlx::Error>;
    async fn update_profile(
        &self,
        id: i64,
        update: ProfileUpdate,
    ) -> Result<Option<User>, sqlx::Error>;
    // Cascades to sessions, bucketlists and their countries.
    async fn delete_user(&self, id: i64) -> Result<bool, sqlx::Error>;

    // --- Sessions ---
    async fn create_session(
        &self,
        token: &str,
        user_id: i64,
        expires_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error>;
    // Resolves a token to its user, ignoring expired rows.
    async fn session_user(&self, token: &str) -> Result<Option<User>, sqlx::Error>;
    async fn delete_session(&self, token: &str) -> Result<bool, sqlx::Error>;
    // One-shot notice queue riding on the session row.
    async fn push_flash(&self, token: &str, flash: FlashMessage) -> Result<(), sqlx::Error>;
    async fn drain_flashes(&self, token: &str) -> Result<Vec<FlashMessage>, sqlx::Error>;

    // --- Bucketlists ---
    // Insert fails with a unique violation when the owner already has a
    // bucketlist with this name.
    async fn create_bucketlist(
        &self,
        user_id: i64,
        name: &str,
        description: &str,
    ) -> Result<Bucketlist, sqlx::Error>;
    async fn get_bucketlist(&self, id: i64) -> Result<Option<Bucketlist>, sqlx::Error>;
    // Name lookup scoped to one owner; names are only unique per user.
    async fn get_bucketlist_by_name(
        &self,
        user_id: i64,
        name: &str,
    ) -> Result<Option<Bucketlist>, sqlx::Error>;
    async fn bucketlists_for_user(&self, user_id: i64) -> Result<Vec<Bucketlist>, sqlx::Error>;
    // The ownership check behind country mutations: does this list belong
    // to this user?
    async fn user_owns_bucketlist(
        &self,
        user_id: i64,
        bucketlist_id: i64,
    ) -> Result<bool, sqlx::Error>;

    // --- Bucketlist Countries ---
    async fn countries_in_bucketlist(
        &self,
        bucketlist_id: i64,
    ) -> Result<Vec<BucketlistCountry>, sqlx::Error>;
    async fn find_country(
        &self,
        bucketlist_id: i64,
        country_name: &str,
    ) -> Result<Option<BucketlistCountry>, sqlx::Error>;
    // Insert fails with a unique violation when the country is already a
    // member of the list.
    async fn add_country(
        &self,
        bucketlist_id: i64,
        country_name: &str,
    ) -> Result<BucketlistCountry, sqlx::Error>;
    async fn set_country_completed(
        &self,
        bucketlist_id: i64,
        country_name: &str,
        completed: bool,
    ) -> Result<bool, sqlx::Error>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the
/// application state.
pub type RepositoryState = Arc<dyn Repository>;

/// SqliteRepository
///
/// The concrete implementation of the `Repository` trait, backed by SQLite.
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for SqliteRepository {
    /// create_user
    ///
    /// Inserts the new user row. The username unique index makes a duplicate
    /// handle surface as a database error the handler turns into a conflict.
    async fn create_user(&self, user: NewUser) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (username, email, password_hash, image_url, created_at) \
             VALUES (?, ?, ?, ?, ?) RETURNING {USER_COLUMNS}"
        ))
        .bind(user.username)
        .bind(user.email)
        .bind(user.password_hash)
        .bind(user.image_url)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// get_user_by_username
    ///
    /// Exact-match lookup used by the login flow.
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = ?"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
    }

    /// list_users
    ///
    /// Implements the directory filter with QueryBuilder for safe
    /// parameterization. Rows come back in insertion order.
    async fn list_users(&self, search: Option<String>) -> Result<Vec<User>, sqlx::Error> {
        let mut builder: QueryBuilder<sqlx::Sqlite> =
            QueryBuilder::new(format!("SELECT {USER_COLUMNS} FROM users"));

        if let Some(q) = search {
            builder.push(" WHERE username LIKE ");
            builder.push_bind(format!("%{}%", q));
        }

        builder.push(" ORDER BY id ASC");

        builder
            .build_query_as::<User>()
            .fetch_all(&self.pool)
            .await
    }

    /// update_profile
    ///
    /// Applies the full resolved profile to the row and returns the updated
    /// user, or None when the row is gone.
    async fn update_profile(
        &self,
        id: i64,
        update: ProfileUpdate,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET username = ?, email = ?, image_url = ?, \
             header_image_url = ?, bio = ?, location = ? \
             WHERE id = ? RETURNING {USER_COLUMNS}"
        ))
        .bind(update.username)
        .bind(update.email)
        .bind(update.image_url)
        .bind(update.header_image_url)
        .bind(update.bio)
        .bind(update.location)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// delete_user
    ///
    /// Removes the account row; sessions, bucketlists and their countries go
    /// with it via ON DELETE CASCADE.
    async fn delete_user(&self, id: i64) -> Result<bool, sqlx::Error> {
        let res = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn create_session(
        &self,
        token: &str,
        user_id: i64,
        expires_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO sessions (token, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)",
        )
        .bind(token)
        .bind(user_id)
        .bind(Utc::now())
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// session_user
    ///
    /// Joins the session row to its user. The datetime() normalization keeps
    /// the expiry comparison correct regardless of stored text precision.
    async fn session_user(&self, token: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            "SELECT u.id, u.username, u.email, u.password_hash, u.image_url, \
                    u.header_image_url, u.bio, u.location, u.created_at \
             FROM sessions s \
             JOIN users u ON s.user_id = u.id \
             WHERE s.token = ? AND datetime(s.expires_at) > datetime(?)",
        )
        .bind(token)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
    }

    async fn delete_session(&self, token: &str) -> Result<bool, sqlx::Error> {
        let res = sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    /// push_flash
    ///
    /// Appends one notice to the session's pending queue. A missing session
    /// (logged out or expired mid-flight) drops the notice silently.
    async fn push_flash(&self, token: &str, flash: FlashMessage) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let stored: Option<String> =
            sqlx::query_scalar("SELECT pending_flashes FROM sessions WHERE token = ?")
                .bind(token)
                .fetch_optional(&mut *tx)
                .await?;

        let Some(stored) = stored else {
            return Ok(());
        };

        let mut flashes: Vec<FlashMessage> = serde_json::from_str(&stored).unwrap_or_default();
        flashes.push(flash);
        let encoded = serde_json::to_string(&flashes)
            .map_err(|e| sqlx::Error::Protocol(format!("flash encode: {e}")))?;

        sqlx::query("UPDATE sessions SET pending_flashes = ? WHERE token = ?")
            .bind(encoded)
            .bind(token)
            .execute(&mut *tx)
            .await?;

        tx.commit().await
    }

    /// drain_flashes
    ///
    /// Returns the queued notices and resets the queue in one transaction so
    /// each notice is delivered exactly once.
    async fn drain_flashes(&self, token: &str) -> Result<Vec<FlashMessage>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let stored: Option<String> =
            sqlx::query_scalar("SELECT pending_flashes FROM sessions WHERE token = ?")
                .bind(token)
                .fetch_optional(&mut *tx)
                .await?;

        let Some(stored) = stored else {
            return Ok(Vec::new());
        };

        sqlx::query("UPDATE sessions SET pending_flashes = '[]' WHERE token = ?")
            .bind(token)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(serde_json::from_str(&stored).unwrap_or_default())
    }

    /// create_bucketlist
    ///
    /// Inserts the list; the (user_id, name) unique index rejects a second
    /// list with the same name for one owner.
    async fn create_bucketlist(
        &self,
        user_id: i64,
        name: &str,
        description: &str,
    ) -> Result<Bucketlist, sqlx::Error> {
        sqlx::query_as::<_, Bucketlist>(&format!(
            "INSERT INTO bucketlists (name, description, user_id, created_at) \
             VALUES (?, ?, ?, ?) RETURNING {BUCKETLIST_COLUMNS}"
        ))
        .bind(name)
        .bind(description)
        .bind(user_id)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
    }

    async fn get_bucketlist(&self, id: i64) -> Result<Option<Bucketlist>, sqlx::Error> {
        sqlx::query_as::<_, Bucketlist>(&format!(
            "SELECT {BUCKETLIST_COLUMNS} FROM bucketlists WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// get_bucketlist_by_name
    ///
    /// Used by the completion toggle, which addresses lists by name within
    /// the acting user's own collection.
    async fn get_bucketlist_by_name(
        &self,
        user_id: i64,
        name: &str,
    ) -> Result<Option<Bucketlist>, sqlx::Error> {
        sqlx::query_as::<_, Bucketlist>(&format!(
            "SELECT {BUCKETLIST_COLUMNS} FROM bucketlists WHERE user_id = ? AND name = ?"
        ))
        .bind(user_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
    }

    async fn bucketlists_for_user(&self, user_id: i64) -> Result<Vec<Bucketlist>, sqlx::Error> {
        sqlx::query_as::<_, Bucketlist>(&format!(
            "SELECT {BUCKETLIST_COLUMNS} FROM bucketlists WHERE user_id = ? ORDER BY id ASC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    /// user_owns_bucketlist
    ///
    /// Boolean ownership probe. Deliberately reveals nothing about whether
    /// the list exists at all.
    async fn user_owns_bucketlist(
        &self,
        user_id: i64,
        bucketlist_id: i64,
    ) -> Result<bool, sqlx::Error> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM bucketlists WHERE id = ? AND user_id = ?",
        )
        .bind(bucketlist_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    async fn countries_in_bucketlist(
        &self,
        bucketlist_id: i64,
    ) -> Result<Vec<BucketlistCountry>, sqlx::Error> {
        sqlx::query_as::<_, BucketlistCountry>(&format!(
            "SELECT {COUNTRY_COLUMNS} FROM bucketlist_countries \
             WHERE bucketlist_id = ? ORDER BY id ASC"
        ))
        .bind(bucketlist_id)
        .fetch_all(&self.pool)
        .await
    }

    /// find_country
    ///
    /// Membership probe backing the duplicate check in the add-country flow.
    async fn find_country(
        &self,
        bucketlist_id: i64,
        country_name: &str,
    ) -> Result<Option<BucketlistCountry>, sqlx::Error> {
        sqlx::query_as::<_, BucketlistCountry>(&format!(
            "SELECT {COUNTRY_COLUMNS} FROM bucketlist_countries \
             WHERE bucketlist_id = ? AND country_name = ?"
        ))
        .bind(bucketlist_id)
        .bind(country_name)
        .fetch_optional(&self.pool)
        .await
    }

    /// add_country
    ///
    /// Inserts the membership row. The (bucketlist_id, country_name) unique
    /// index closes the race the handler's pre-check leaves open.
    async fn add_country(
        &self,
        bucketlist_id: i64,
        country_name: &str,
    ) -> Result<BucketlistCountry, sqlx::Error> {
        sqlx::query_as::<_, BucketlistCountry>(&format!(
            "INSERT INTO bucketlist_countries (country_name, bucketlist_id) \
             VALUES (?, ?) RETURNING {COUNTRY_COLUMNS}"
        ))
        .bind(country_name)
        .bind(bucketlist_id)
        .fetch_one(&self.pool)
        .await
    }

    async fn set_country_completed(
        &self,
        bucketlist_id: i64,
        country_name: &str,
        completed: bool,
    ) -> Result<bool, sqlx::Error> {
        let res = sqlx::query(
            "UPDATE bucketlist_countries SET completed = ? \
             WHERE bucketlist_id = ? AND country_name = ?",
        )
        .bind(completed)
        .bind(bucketlist_id)
        .bind(country_name)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }
}
