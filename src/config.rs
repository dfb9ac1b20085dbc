use std::env;

/// AppConfig
///
/// Holds the application's entire configuration state. The struct is immutable
/// once loaded, ensuring consistency across all services (Repository, country
/// aggregation, HTTP layer). It is pulled into the application state via
/// FromRef.
#[derive(Clone)]
pub struct AppConfig {
    // Database connection string (SQLite).
    pub db_url: String,
    // TCP port the HTTP server binds on.
    pub port: u16,
    // Base URL of the country directory API (restcountries v2 shape).
    pub country_api_base: String,
    // Base URL of the image search API (Pixabay shape).
    pub pixabay_api_base: String,
    // API key sent with every image search request.
    pub pixabay_key: String,
    // Runtime environment marker. Controls log format and secret handling.
    pub env: Env,
}

/// Env
///
/// Defines the runtime context, used to switch between development defaults
/// (on-disk SQLite, placeholder API key) and production requirements where
/// the secrets must be set explicitly.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Default for AppConfig {
    /// default
    ///
    /// Provides a safe, non-panicking AppConfig instance primarily used for
    /// test setup. Tests run against an in-memory database and point the
    /// external bases at localhost so nothing leaves the machine.
    fn default() -> Self {
        Self {
            db_url: "sqlite::memory:".to_string(),
            port: 8000,
            country_api_base: "http://localhost:1/v2".to_string(),
            pixabay_api_base: "http://localhost:1/api/".to_string(),
            pixabay_key: "test-pixabay-key".to_string(),
            env: Env::Local,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// The canonical function for initializing the application configuration
    /// at startup. It reads all parameters from environment variables and
    /// fails fast.
    ///
    /// # Panics
    /// Panics if a critical environment variable required for the current
    /// runtime environment (especially Production) is not found. This
    /// prevents the application from starting with an incomplete or insecure
    /// configuration.
    pub fn load() -> Self {
        let env_str = env::var("APP_ENV").unwrap_or_else(|_| "local".to_string());
        let env = match env_str.as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(8000);

        // External service bases are overridable in every environment so
        // staging can point at recorded fixtures.
        let country_api_base = env::var("COUNTRY_API_BASE")
            .unwrap_or_else(|_| "https://restcountries.com/v2".to_string());
        let pixabay_api_base =
            env::var("PIXABAY_API_BASE").unwrap_or_else(|_| "https://pixabay.com/api/".to_string());

        match env {
            Env::Local => Self {
                env: Env::Local,
                // An on-disk file keeps local state across restarts without
                // any infrastructure.
                db_url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite:letsgotravel.db".to_string()),
                port,
                country_api_base,
                pixabay_api_base,
                // A placeholder key is fine locally; image searches simply
                // come back empty and the default banner kicks in.
                pixabay_key: env::var("PIXABAY_API_KEY")
                    .unwrap_or_else(|_| "dev-pixabay-key".to_string()),
            },
            Env::Production => Self {
                env: Env::Production,
                // Production demands explicit settings for state and secrets.
                db_url: env::var("DATABASE_URL").expect("FATAL: DATABASE_URL required in prod"),
                port,
                country_api_base,
                pixabay_api_base,
                pixabay_key: env::var("PIXABAY_API_KEY")
                    .expect("FATAL: PIXABAY_API_KEY required in prod"),
            },
        }
    }
}
