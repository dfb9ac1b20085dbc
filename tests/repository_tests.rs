use chrono::{Duration, Utc};
use letsgotravel::{
    models::{FlashMessage, NewUser, ProfileUpdate, User},
    repository::{Repository, SqliteRepository},
};
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use tokio::test;
use uuid::Uuid;

// --- Test Context and Setup ---

/// A simple structure to hold the database pool for testing.
struct DbTestContext {
    pool: SqlitePool,
}

impl DbTestContext {
    /// Opens a private in-memory database and applies the migrations. One
    /// connection keeps the in-memory database alive for the whole test.
    async fn setup() -> Self {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to open in-memory SQLite for tests.");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run database migrations.");

        DbTestContext { pool }
    }

    fn repository(&self) -> SqliteRepository {
        SqliteRepository::new(self.pool.clone())
    }
}

// --- Test Data Helpers ---

/// Inserts a user through the repository. The hash is an opaque string at
/// this layer; nothing in the repository interprets it.
async fn seed_user(repo: &SqliteRepository, username: &str) -> User {
    repo.create_user(NewUser {
        username: username.to_string(),
        email: format!("{username}@test.com"),
        password_hash: "not-a-real-hash".to_string(),
        image_url: "/static/images/default-pic.png".to_string(),
    })
    .await
    .expect("Failed to create test user")
}

/// Opens a session for the user with a fresh token, valid for two weeks.
async fn seed_session(repo: &SqliteRepository, user_id: i64) -> String {
    let token = Uuid::new_v4().to_string();
    repo.create_session(&token, user_id, Utc::now() + Duration::days(14))
        .await
        .expect("Failed to create test session");
    token
}

// --- User Tests ---

#[test]
async fn test_create_and_get_user() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();

    let created = seed_user(&repo, "alice").await;
    assert_eq!(created.username, "alice");
    assert_eq!(created.email, "alice@test.com");
    assert_eq!(created.image_url, "/static/images/default-pic.png");
    assert_eq!(
        created.header_image_url, "/static/images/travel-default.webp",
        "Header image should take the schema default"
    );
    assert!(created.bio.is_none());

    let fetched = repo.get_user(created.id).await.expect("get_user failed");
    assert_eq!(fetched.expect("User should exist").username, "alice");

    let by_name = repo
        .get_user_by_username("alice")
        .await
        .expect("get_user_by_username failed");
    assert_eq!(by_name.expect("User should exist").id, created.id);

    let missing = repo.get_user(9999).await.expect("get_user failed");
    assert!(missing.is_none());
}

#[test]
async fn test_username_must_be_unique() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();

    seed_user(&repo, "alice").await;

    let err = repo
        .create_user(NewUser {
            username: "alice".to_string(),
            email: "other@test.com".to_string(),
            password_hash: "not-a-real-hash".to_string(),
            image_url: "/static/images/default-pic.png".to_string(),
        })
        .await
        .expect_err("Duplicate username should be rejected");

    assert!(
        matches!(&err, sqlx::Error::Database(db) if db.is_unique_violation()),
        "Expected a unique violation, got: {err:?}"
    );
}

#[test]
async fn test_list_users_with_filter() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();

    let alice = seed_user(&repo, "alice").await;
    seed_user(&repo, "bob").await;
    seed_user(&repo, "carlisle").await;

    // 1. No filter lists everyone in id order.
    let all = repo.list_users(None).await.expect("list_users failed");
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].id, alice.id, "Listing should be ordered by id");

    // 2. Substring filter.
    let matching = repo
        .list_users(Some("li".to_string()))
        .await
        .expect("list_users failed");
    let names: Vec<_> = matching.iter().map(|u| u.username.as_str()).collect();
    assert_eq!(names, vec!["alice", "carlisle"]);

    // 3. A filter nothing matches.
    let none = repo
        .list_users(Some("zzz".to_string()))
        .await
        .expect("list_users failed");
    assert!(none.is_empty());
}

#[test]
async fn test_update_profile_and_rename_conflict() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();

    let alice = seed_user(&repo, "alice").await;
    seed_user(&repo, "bob").await;

    // 1. A full update sticks.
    let updated = repo
        .update_profile(
            alice.id,
            ProfileUpdate {
                username: "alice2".to_string(),
                email: "alice2@test.com".to_string(),
                image_url: "/media/alice.png".to_string(),
                header_image_url: "/media/banner.png".to_string(),
                bio: Some("traveller".to_string()),
                location: Some("Lisbon".to_string()),
            },
        )
        .await
        .expect("update_profile failed")
        .expect("User should exist");
    assert_eq!(updated.username, "alice2");
    assert_eq!(updated.bio.as_deref(), Some("traveller"));
    assert_eq!(updated.location.as_deref(), Some("Lisbon"));

    // 2. Renaming onto a taken username hits the unique index.
    let err = repo
        .update_profile(
            alice.id,
            ProfileUpdate {
                username: "bob".to_string(),
                email: "alice2@test.com".to_string(),
                image_url: "/media/alice.png".to_string(),
                header_image_url: "/media/banner.png".to_string(),
                bio: None,
                location: None,
            },
        )
        .await
        .expect_err("Rename onto a taken username should be rejected");
    assert!(matches!(&err, sqlx::Error::Database(db) if db.is_unique_violation()));

    // 3. Updating a missing user answers None, not an error.
    let missing = repo
        .update_profile(
            9999,
            ProfileUpdate {
                username: "ghost".to_string(),
                email: "ghost@test.com".to_string(),
                image_url: "/static/images/default-pic.png".to_string(),
                header_image_url: "/static/images/travel-default.webp".to_string(),
                bio: None,
                location: None,
            },
        )
        .await
        .expect("update_profile failed");
    assert!(missing.is_none());
}

#[test]
async fn test_delete_user_cascades() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();

    let alice = seed_user(&repo, "alice").await;
    let token = seed_session(&repo, alice.id).await;
    let list = repo
        .create_bucketlist(alice.id, "Summer", "warm places")
        .await
        .expect("Failed to create bucketlist");
    repo.add_country(list.id, "Portugal")
        .await
        .expect("Failed to add country");

    // 1. Delete reports the row as gone.
    assert!(repo.delete_user(alice.id).await.expect("delete failed"));

    // 2. Everything hanging off the user went with it.
    assert!(repo.get_user(alice.id).await.unwrap().is_none());
    assert!(repo.session_user(&token).await.unwrap().is_none());
    assert!(repo.get_bucketlist(list.id).await.unwrap().is_none());
    assert!(
        repo.countries_in_bucketlist(list.id)
            .await
            .unwrap()
            .is_empty()
    );

    // 3. A second delete is a no-op.
    assert!(!repo.delete_user(alice.id).await.expect("delete failed"));
}

// --- Session Tests ---

#[test]
async fn test_session_resolution_and_expiry() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let alice = seed_user(&repo, "alice").await;

    // 1. A live session resolves to its user.
    let token = seed_session(&repo, alice.id).await;
    let resolved = repo.session_user(&token).await.expect("lookup failed");
    assert_eq!(resolved.expect("Session should resolve").id, alice.id);

    // 2. An expired session resolves to nothing.
    let stale = Uuid::new_v4().to_string();
    repo.create_session(&stale, alice.id, Utc::now() - Duration::hours(1))
        .await
        .expect("Failed to create stale session");
    assert!(repo.session_user(&stale).await.unwrap().is_none());

    // 3. Unknown tokens resolve to nothing.
    assert!(repo.session_user("no-such-token").await.unwrap().is_none());

    // 4. Deleting ends the session; a second delete is a no-op.
    assert!(repo.delete_session(&token).await.expect("delete failed"));
    assert!(repo.session_user(&token).await.unwrap().is_none());
    assert!(!repo.delete_session(&token).await.expect("delete failed"));
}

#[test]
async fn test_flash_queue_drains_once() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let alice = seed_user(&repo, "alice").await;
    let token = seed_session(&repo, alice.id).await;

    // 1. Queued notices come back in order.
    repo.push_flash(&token, FlashMessage::success("Hello, alice!"))
        .await
        .expect("push failed");
    repo.push_flash(&token, FlashMessage::danger("Country France is already in bucketlist"))
        .await
        .expect("push failed");

    let drained = repo.drain_flashes(&token).await.expect("drain failed");
    assert_eq!(drained.len(), 2);
    assert_eq!(drained[0].message, "Hello, alice!");
    assert_eq!(drained[1].message, "Country France is already in bucketlist");

    // 2. Draining consumes the queue.
    let again = repo.drain_flashes(&token).await.expect("drain failed");
    assert!(again.is_empty(), "Notices must only be delivered once");

    // 3. Unknown sessions are a silent no-op on both sides.
    repo.push_flash("no-such-token", FlashMessage::info("lost"))
        .await
        .expect("push to unknown session should not error");
    assert!(
        repo.drain_flashes("no-such-token")
            .await
            .expect("drain failed")
            .is_empty()
    );
}

// --- Bucketlist Tests ---

#[test]
async fn test_bucketlist_names_unique_per_owner() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let alice = seed_user(&repo, "alice").await;
    let bob = seed_user(&repo, "bob").await;

    let alices = repo
        .create_bucketlist(alice.id, "Summer", "warm places")
        .await
        .expect("Failed to create bucketlist");
    assert_eq!(alices.user_id, alice.id);
    assert_eq!(alices.description, "warm places");

    // 1. Same owner, same name: rejected.
    let err = repo
        .create_bucketlist(alice.id, "Summer", "again")
        .await
        .expect_err("Duplicate name for one owner should be rejected");
    assert!(matches!(&err, sqlx::Error::Database(db) if db.is_unique_violation()));

    // 2. Different owner, same name: allowed.
    let bobs = repo
        .create_bucketlist(bob.id, "Summer", "")
        .await
        .expect("Same name under another owner should be allowed");
    assert_ne!(bobs.id, alices.id);

    // 3. Name lookup is scoped to the owner.
    let found = repo
        .get_bucketlist_by_name(alice.id, "Summer")
        .await
        .expect("lookup failed")
        .expect("Bucketlist should exist");
    assert_eq!(found.id, alices.id);
    assert!(
        repo.get_bucketlist_by_name(alice.id, "Winter")
            .await
            .unwrap()
            .is_none()
    );

    // 4. Ownership checks see through id references.
    assert!(repo.user_owns_bucketlist(alice.id, alices.id).await.unwrap());
    assert!(!repo.user_owns_bucketlist(alice.id, bobs.id).await.unwrap());

    // 5. Listing answers each owner their own lists.
    let alice_lists = repo.bucketlists_for_user(alice.id).await.unwrap();
    assert_eq!(alice_lists.len(), 1);
    assert_eq!(alice_lists[0].id, alices.id);
}

#[test]
async fn test_country_membership_dedupe_and_toggle() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let alice = seed_user(&repo, "alice").await;
    let list = repo
        .create_bucketlist(alice.id, "Summer", "")
        .await
        .expect("Failed to create bucketlist");

    // 1. A fresh membership starts uncompleted.
    let added = repo
        .add_country(list.id, "France")
        .await
        .expect("Failed to add country");
    assert_eq!(added.country_name, "France");
    assert!(!added.completed);
    assert_eq!(added.bucketlist_id, list.id);

    // 2. find_country sees it; unknown names answer None.
    assert!(repo.find_country(list.id, "France").await.unwrap().is_some());
    assert!(repo.find_country(list.id, "Spain").await.unwrap().is_none());

    // 3. The same country twice hits the unique index.
    let err = repo
        .add_country(list.id, "France")
        .await
        .expect_err("Duplicate membership should be rejected");
    assert!(matches!(&err, sqlx::Error::Database(db) if db.is_unique_violation()));

    // 4. Completion toggles both ways and reports missing rows.
    assert!(
        repo.set_country_completed(list.id, "France", true)
            .await
            .unwrap()
    );
    let countries = repo.countries_in_bucketlist(list.id).await.unwrap();
    assert_eq!(countries.len(), 1);
    assert!(countries[0].completed);

    assert!(
        repo.set_country_completed(list.id, "France", false)
            .await
            .unwrap()
    );
    assert!(
        !repo.countries_in_bucketlist(list.id).await.unwrap()[0].completed
    );

    assert!(
        !repo
            .set_country_completed(list.id, "Spain", true)
            .await
            .unwrap(),
        "Toggling an absent membership should report false"
    );
}

#[test]
async fn test_countries_listed_in_insertion_order() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let alice = seed_user(&repo, "alice").await;
    let list = repo
        .create_bucketlist(alice.id, "Tour", "")
        .await
        .expect("Failed to create bucketlist");

    for name in ["Portugal", "France", "Japan"] {
        repo.add_country(list.id, name).await.expect("add failed");
    }

    let countries = repo.countries_in_bucketlist(list.id).await.unwrap();
    let names: Vec<_> = countries.iter().map(|c| c.country_name.as_str()).collect();
    assert_eq!(names, vec!["Portugal", "France", "Japan"]);
}
