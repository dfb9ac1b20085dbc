use letsgotravel::{
    countries::{
        self, CountryRecord, CurrencyRecord, DirectoryState, ImageSearchState, LanguageRecord,
        MockCountryDirectory, MockImageSearch,
    },
    error::ApiError,
    models::DEFAULT_HEADER_IMAGE_URL,
};
use std::sync::Arc;

// --- Test Data Helpers ---

/// A fully-populated directory record, the shape restcountries answers for
/// an exact match.
fn france() -> CountryRecord {
    CountryRecord {
        name: "France".to_string(),
        capital: Some("Paris".to_string()),
        region: "Europe".to_string(),
        subregion: Some("Western Europe".to_string()),
        population: 67_000_000,
        flag: "https://flags.test/fr.svg".to_string(),
        currencies: vec![CurrencyRecord {
            name: "Euro".to_string(),
        }],
        languages: vec![LanguageRecord {
            name: "French".to_string(),
        }],
    }
}

/// A sparse record; partial matches often come back with holes.
fn territory(name: &str) -> CountryRecord {
    CountryRecord {
        name: name.to_string(),
        ..CountryRecord::default()
    }
}

#[cfg(test)]
mod aggregator_tests {
    use super::*;

    #[tokio::test]
    async fn test_profile_merges_directory_and_image() {
        let directory: DirectoryState =
            Arc::new(MockCountryDirectory::with_records(vec![france()]));
        let images: ImageSearchState =
            Arc::new(MockImageSearch::with_image("https://images.test/paris.jpg"));

        let profile = countries::country_profile(&directory, &images, "france")
            .await
            .expect("Lookup should succeed");

        assert_eq!(profile.name, "France");
        assert_eq!(profile.capital.as_deref(), Some("Paris"));
        assert_eq!(profile.region, "Europe");
        assert_eq!(profile.subregion.as_deref(), Some("Western Europe"));
        assert_eq!(profile.population, 67_000_000);
        assert_eq!(profile.flag, "https://flags.test/fr.svg");
        assert_eq!(profile.currencies, vec!["Euro".to_string()]);
        assert_eq!(profile.languages, vec!["French".to_string()]);
        assert_eq!(profile.header_image, "https://images.test/paris.jpg");
    }

    #[tokio::test]
    async fn test_first_directory_match_wins() {
        // "india" resolves to several entries; the page is built from the
        // best match, which the directory serves first.
        let directory: DirectoryState = Arc::new(MockCountryDirectory::with_records(vec![
            territory("India"),
            territory("British Indian Ocean Territory"),
        ]));
        let images: ImageSearchState = Arc::new(MockImageSearch::no_hits());

        let profile = countries::country_profile(&directory, &images, "india")
            .await
            .expect("Lookup should succeed");

        assert_eq!(profile.name, "India");
    }

    #[tokio::test]
    async fn test_unknown_country_skips_image_search() {
        let directory: DirectoryState = Arc::new(MockCountryDirectory::not_found());
        let images = MockImageSearch::with_image("https://images.test/unused.jpg");
        let images_state: ImageSearchState = Arc::new(images.clone());

        let err = countries::country_profile(&directory, &images_state, "atlantis")
            .await
            .expect_err("Unknown country should fail the lookup");

        assert!(matches!(err, ApiError::CountryNotFound));
        assert_eq!(
            images.call_count(),
            0,
            "No image traffic for an unresolvable country"
        );
    }

    #[tokio::test]
    async fn test_zero_image_hits_fall_back_to_default_banner() {
        let directory: DirectoryState =
            Arc::new(MockCountryDirectory::with_records(vec![france()]));
        let images = MockImageSearch::no_hits();
        let images_state: ImageSearchState = Arc::new(images.clone());

        let profile = countries::country_profile(&directory, &images_state, "france")
            .await
            .expect("Lookup should succeed");

        assert_eq!(profile.header_image, DEFAULT_HEADER_IMAGE_URL);
        assert_eq!(images.call_count(), 1);
    }

    #[tokio::test]
    async fn test_image_search_failure_is_absorbed() {
        let directory: DirectoryState =
            Arc::new(MockCountryDirectory::with_records(vec![france()]));
        let images_state: ImageSearchState = Arc::new(MockImageSearch::new_failing());

        let profile = countries::country_profile(&directory, &images_state, "france")
            .await
            .expect("A broken image search must not take the page down");

        assert_eq!(profile.header_image, DEFAULT_HEADER_IMAGE_URL);
    }

    #[tokio::test]
    async fn test_directory_failure_propagates() {
        let directory: DirectoryState = Arc::new(MockCountryDirectory::new_failing());
        let images = MockImageSearch::with_image("https://images.test/unused.jpg");
        let images_state: ImageSearchState = Arc::new(images.clone());

        let err = countries::country_profile(&directory, &images_state, "france")
            .await
            .expect_err("Directory outage should surface as an error");

        assert!(matches!(err, ApiError::Upstream(_)));
        assert_eq!(images.call_count(), 0);
    }
}

#[cfg(test)]
mod mock_tests {
    use super::*;
    use letsgotravel::countries::CountryDirectory;

    #[tokio::test]
    async fn test_mock_directory_serves_scripted_records() {
        let mock = MockCountryDirectory::with_records(vec![france()]);
        let records = mock.lookup("anything").await.expect("Should answer");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "France");
    }

    #[tokio::test]
    async fn test_mock_directory_failure() {
        let mock = MockCountryDirectory::new_failing();
        assert!(mock.lookup("france").await.is_err());
    }
}
