use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::{
    error::ApiError,
    models::{CountryProfile, DEFAULT_HEADER_IMAGE_URL},
};

/// Outbound calls give up after this long; a stalled upstream must not hold
/// a request slot open indefinitely.
pub const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(10);

// 1. External Service Contracts

/// CountryDirectory
///
/// Abstract contract for the country metadata lookup. The production
/// implementation talks to a restcountries-shaped HTTP API; the Mock serves
/// scripted records, the same swap the persistence layer gets.
#[async_trait]
pub trait CountryDirectory: Send + Sync {
    /// Resolves a free-text name to the directory's matches, best first.
    /// An unknown name is CountryNotFound, not an empty list.
    async fn lookup(&self, name: &str) -> Result<Vec<CountryRecord>, ApiError>;
}

/// ImageSearch
///
/// Abstract contract for the header image search. `Ok(None)` means the
/// search ran but had no hits; the caller substitutes the default banner.
#[async_trait]
pub trait ImageSearch: Send + Sync {
    async fn first_image(&self, query: &str) -> Result<Option<String>, ApiError>;
}

pub type DirectoryState = Arc<dyn CountryDirectory>;
pub type ImageSearchState = Arc<dyn ImageSearch>;

// --- Directory Wire Types ---

/// CountryRecord
///
/// One match as the directory serves it. Only the fields the country page
/// renders are deserialized; everything else in the payload is ignored.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CountryRecord {
    pub name: String,
    #[serde(default)]
    pub capital: Option<String>,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub subregion: Option<String>,
    #[serde(default)]
    pub population: i64,
    #[serde(default)]
    pub flag: String,
    #[serde(default)]
    pub currencies: Vec<CurrencyRecord>,
    #[serde(default)]
    pub languages: Vec<LanguageRecord>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CurrencyRecord {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LanguageRecord {
    #[serde(default)]
    pub name: String,
}

// --- Image Search Wire Types ---

#[derive(Debug, Deserialize)]
struct PixabayResponse {
    #[serde(default)]
    hits: Vec<PixabayHit>,
}

#[derive(Debug, Deserialize)]
struct PixabayHit {
    #[serde(rename = "largeImageURL")]
    large_image_url: String,
}

// 2. The Real Implementations (restcountries / Pixabay)

/// build_http_client
///
/// The single outbound client both external services share. reqwest clients
/// hold an internal connection pool, so one instance cloned into each
/// service is the intended usage.
pub fn build_http_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder().timeout(UPSTREAM_TIMEOUT).build()
}

/// RestCountriesClient
///
/// `CountryDirectory` implementation over the restcountries v2 HTTP shape:
/// GET {base}/name/{query} answers with an array of matches, or 404 when
/// the name resolves to nothing.
pub struct RestCountriesClient {
    http: reqwest::Client,
    base: String,
}

impl RestCountriesClient {
    pub fn new(http: reqwest::Client, base: impl Into<String>) -> Self {
        Self {
            http,
            base: base.into(),
        }
    }
}

#[async_trait]
impl CountryDirectory for RestCountriesClient {
    /// lookup
    ///
    /// Maps the directory's 404 to CountryNotFound so the handler can answer
    /// with the soft "Country not found" notice. Every other non-success
    /// status is an upstream failure.
    async fn lookup(&self, name: &str) -> Result<Vec<CountryRecord>, ApiError> {
        let url = format!("{}/name/{}", self.base, name);

        let response = self.http.get(&url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ApiError::CountryNotFound);
        }
        if !response.status().is_success() {
            return Err(ApiError::Upstream(format!(
                "country directory answered {} for {url}",
                response.status()
            )));
        }

        Ok(response.json().await?)
    }
}

/// PixabayClient
///
/// `ImageSearch` implementation over the Pixabay API shape. The query asks
/// for landmark photos of the country's capital and takes the first hit's
/// large rendition.
pub struct PixabayClient {
    http: reqwest::Client,
    base: String,
    key: String,
}

impl PixabayClient {
    pub fn new(http: reqwest::Client, base: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            http,
            base: base.into(),
            key: key.into(),
        }
    }
}

#[async_trait]
impl ImageSearch for PixabayClient {
    async fn first_image(&self, query: &str) -> Result<Option<String>, ApiError> {
        let q = format!("{query}+capital");

        let response = self
            .http
            .get(&self.base)
            .query(&[
                ("q", q.as_str()),
                ("image_type", "photo"),
                ("category", "landmark"),
                ("per_page", "3"),
                ("key", self.key.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ApiError::Upstream(format!(
                "image search answered {}",
                response.status()
            )));
        }

        let payload: PixabayResponse = response.json().await?;

        Ok(payload
            .hits
            .into_iter()
            .next()
            .map(|hit| hit.large_image_url))
    }
}

// --- Aggregation ---

/// country_profile
///
/// The merge the country page is built from: first directory match, then the
/// header image search. A missing country short-circuits before any image
/// traffic. A failed or empty image search degrades to the default banner;
/// the page still renders.
pub async fn country_profile(
    directory: &DirectoryState,
    images: &ImageSearchState,
    name: &str,
) -> Result<CountryProfile, ApiError> {
    let record = directory
        .lookup(name)
        .await?
        .into_iter()
        .next()
        // Some mirrors answer 200 with an empty array instead of 404.
        .ok_or(ApiError::CountryNotFound)?;

    // The search keys off the canonical name the directory resolved, not
    // the raw user query.
    let header_image = match images.first_image(&record.name).await {
        Ok(Some(url)) => url,
        Ok(None) => DEFAULT_HEADER_IMAGE_URL.to_string(),
        Err(e) => {
            tracing::warn!("image search failed, using default banner: {e}");
            DEFAULT_HEADER_IMAGE_URL.to_string()
        }
    };

    Ok(CountryProfile {
        name: record.name,
        capital: record.capital,
        region: record.region,
        subregion: record.subregion,
        population: record.population,
        flag: record.flag,
        currencies: record.currencies.into_iter().map(|c| c.name).collect(),
        languages: record.languages.into_iter().map(|l| l.name).collect(),
        header_image,
    })
}

// 3. The Mock Implementations (For Unit Tests)

/// MockCountryDirectory
///
/// A mock implementation of `CountryDirectory` used exclusively for unit and
/// integration testing, serving scripted records without any network
/// traffic.
#[derive(Clone, Default)]
pub struct MockCountryDirectory {
    /// Records served for every lookup, in directory order. Empty means
    /// "no match".
    pub records: Vec<CountryRecord>,
    /// When true, all lookups return a simulated upstream failure.
    pub should_fail: bool,
}

impl MockCountryDirectory {
    pub fn with_records(records: Vec<CountryRecord>) -> Self {
        Self {
            records,
            should_fail: false,
        }
    }

    pub fn not_found() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            records: Vec::new(),
            should_fail: true,
        }
    }
}

#[async_trait]
impl CountryDirectory for MockCountryDirectory {
    async fn lookup(&self, _name: &str) -> Result<Vec<CountryRecord>, ApiError> {
        if self.should_fail {
            return Err(ApiError::Upstream("mock directory failure".to_string()));
        }
        if self.records.is_empty() {
            return Err(ApiError::CountryNotFound);
        }
        Ok(self.records.clone())
    }
}

/// MockImageSearch
///
/// A mock implementation of `ImageSearch`. Besides serving a scripted
/// answer, it counts invocations so tests can assert that a failed country
/// lookup never triggers an image search.
#[derive(Clone, Default)]
pub struct MockImageSearch {
    /// Served for every search; None models a zero-hit answer.
    pub image_url: Option<String>,
    /// When true, all searches return a simulated upstream failure.
    pub should_fail: bool,
    calls: Arc<AtomicUsize>,
}

impl MockImageSearch {
    pub fn with_image(url: impl Into<String>) -> Self {
        Self {
            image_url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn no_hits() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Number of searches performed so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageSearch for MockImageSearch {
    async fn first_image(&self, _query: &str) -> Result<Option<String>, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.should_fail {
            return Err(ApiError::Upstream("mock image search failure".to_string()));
        }
        Ok(self.image_url.clone())
    }
}
