use letsgotravel::{
    AppState,
    config::{AppConfig, Env},
    countries::{
        DirectoryState, ImageSearchState, PixabayClient, RestCountriesClient, build_http_client,
    },
    create_router,
    repository::{RepositoryState, SqliteRepository},
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// The asynchronous entry point for the application, responsible for initializing
/// all core components: Configuration, Logging, Database, External Clients, and
/// the HTTP Server.
#[tokio::main]
async fn main() {
    // 1. Configuration & Environment Loading (Fail-Fast)
    // Loads .env file settings before configuration can be read.
    dotenv::dotenv().ok();
    // AppConfig::load() implements the fail-fast principle for missing Production secrets.
    let config = AppConfig::load();

    // 2. Logging Filter Setup
    // Sets the default log level. It prioritizes the RUST_LOG environment variable,
    // falling back to sensible defaults for local development.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "letsgotravel=debug,tower_http=info,axum=trace".into());

    // 3. Initialize Logging based on Environment
    // The structured logging format is dynamically selected based on the APP_ENV.
    match config.env {
        Env::Local => {
            // LOCAL: Pretty print output for human readability during local debugging.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            // PROD: JSON format output for ingestion by centralized log aggregators.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 4. Database Initialization (SQLite)
    // Creates a connection pool to the SQLite database defined in the configuration.
    // The database file is created on first run; foreign keys carry the cascades,
    // so they must be switched on per connection.
    let connect_options = SqliteConnectOptions::from_str(&config.db_url)
        .expect("FATAL: invalid DATABASE_URL.")
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(connect_options)
        .await
        .expect("FATAL: Failed to open SQLite database. Check DATABASE_URL.");

    // Apply the embedded migrations before anything touches the schema.
    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("FATAL: database migration failed.");

    // Instantiate the Repository, wrapping it in an Arc for thread-safe sharing.
    let repo = Arc::new(SqliteRepository::new(pool)) as RepositoryState;

    // 5. External Client Initialization (restcountries / Pixabay)
    // One outbound HTTP client is shared by both upstream integrations.
    let http = build_http_client().expect("FATAL: failed to build outbound HTTP client.");

    let directory =
        Arc::new(RestCountriesClient::new(http.clone(), &config.country_api_base))
            as DirectoryState;
    let images = Arc::new(PixabayClient::new(
        http,
        &config.pixabay_api_base,
        &config.pixabay_key,
    )) as ImageSearchState;

    // 6. Unified State Assembly
    // Bundles all initialized dependencies into the shared AppState.
    let port = config.port;
    let app_state = AppState {
        repo,
        directory,
        images,
        config,
    };

    // 7. Router and Server Startup
    let app = create_router(app_state);

    // Binds the TCP listener and initiates the HTTP server.
    let listener = TcpListener::bind(format!("0.0.0.0:{port}")).await.unwrap();

    tracing::info!("HTTP server bound successfully.");
    tracing::info!("Listening on 0.0.0.0:{port}");
    tracing::info!(
        "API Documentation (Swagger UI) available at: http://localhost:{port}/swagger-ui"
    );

    // The long-running Axum server process.
    axum::serve(listener, app).await.unwrap();
}
