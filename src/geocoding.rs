//! Address autocomplete.
//!
//! Typing into the start-address field produces suggestions from a
//! [`GeocodeProvider`]. Queries shorter than three characters (after trimming)
//! never reach the provider, and lookups are debounced so that rapid edits
//! produce a single request for the final text.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::watch;

use crate::error::{Result, RunaRouteError};
use crate::tracker::TaskHandle;
use crate::Coordinate;

/// Minimum trimmed length of a query worth sending.
pub const MIN_QUERY_CHARS: usize = 3;

/// One address suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(rename_all = "camelCase")]
pub struct GeocodeSuggestion {
    pub id: u64,
    pub display_name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl GeocodeSuggestion {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// A trimmed query that is long enough to look up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressQuery(String);

impl AddressQuery {
    /// Trim `input`; `None` if fewer than [`MIN_QUERY_CHARS`] characters remain.
    pub fn normalize(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        if trimmed.chars().count() < MIN_QUERY_CHARS {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Forward geocoder, free text to suggestions.
pub trait GeocodeProvider: Send + Sync {
    fn search(
        &self,
        query: &AddressQuery,
    ) -> impl Future<Output = Result<Vec<GeocodeSuggestion>>> + Send;
}

impl<T: GeocodeProvider> GeocodeProvider for Arc<T> {
    fn search(
        &self,
        query: &AddressQuery,
    ) -> impl Future<Output = Result<Vec<GeocodeSuggestion>>> + Send {
        (**self).search(query)
    }
}

/// Configuration for address autocomplete.
#[derive(Debug, Clone)]
pub struct GeocodingConfig {
    /// Base URL of the Nominatim instance.
    /// Default: "https://nominatim.openstreetmap.org"
    pub base_url: String,

    /// Nominatim's usage policy requires an identifying User-Agent.
    /// Default: "runaroute-app/1.0"
    pub user_agent: String,

    /// Default: "en"
    pub accept_language: String,

    /// Quiet period after the last edit before a lookup is sent.
    /// Default: 600 ms
    pub debounce: Duration,

    /// Default: 10 seconds
    pub timeout: Duration,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://nominatim.openstreetmap.org".to_string(),
            user_agent: "runaroute-app/1.0".to_string(),
            accept_language: "en".to_string(),
            debounce: Duration::from_millis(600),
            timeout: Duration::from_secs(10),
        }
    }
}

// ============================================================================
// Debounced autocomplete
// ============================================================================

/// Debounced suggestion list for a text field.
///
/// Results are published on a watch channel; lookup failures are logged and
/// publish an empty list.
pub struct AddressAutocomplete<G> {
    provider: Arc<G>,
    debounce: Duration,
    runtime: Option<Handle>,
    sender: Arc<watch::Sender<Vec<GeocodeSuggestion>>>,
    latest: Arc<AtomicU64>,
    lookup: TaskHandle,
}

impl<G: GeocodeProvider + 'static> AddressAutocomplete<G> {
    pub fn new(provider: G, config: &GeocodingConfig) -> Self {
        let (sender, _) = watch::channel(Vec::new());
        Self {
            provider: Arc::new(provider),
            debounce: config.debounce,
            runtime: None,
            sender: Arc::new(sender),
            latest: Arc::new(AtomicU64::new(0)),
            lookup: TaskHandle::default(),
        }
    }

    pub fn with_runtime(provider: G, config: &GeocodingConfig, runtime: Handle) -> Self {
        Self {
            runtime: Some(runtime),
            ..Self::new(provider, config)
        }
    }

    /// Receiver for the current suggestion list.
    pub fn subscribe(&self) -> watch::Receiver<Vec<GeocodeSuggestion>> {
        self.sender.subscribe()
    }

    pub fn suggestions(&self) -> Vec<GeocodeSuggestion> {
        self.sender.borrow().clone()
    }

    /// React to an edit of the address field.
    ///
    /// Cancels any pending lookup. Short input clears the suggestions at once;
    /// otherwise a lookup is scheduled after the debounce period.
    pub fn input_changed(&mut self, text: &str) {
        self.lookup.cancel();
        let generation = self.latest.fetch_add(1, Ordering::SeqCst) + 1;

        let Some(query) = AddressQuery::normalize(text) else {
            self.sender.send_replace(Vec::new());
            return;
        };

        let provider = Arc::clone(&self.provider);
        let sender = Arc::clone(&self.sender);
        let latest = Arc::clone(&self.latest);
        let debounce = self.debounce;

        let task = async move {
            tokio::time::sleep(debounce).await;
            debug!("[Autocomplete] Looking up '{}'", query.as_str());
            let suggestions = match provider.search(&query).await {
                Ok(suggestions) => suggestions,
                Err(e) => {
                    warn!("[Autocomplete] Lookup for '{}' failed: {}", query.as_str(), e);
                    Vec::new()
                }
            };
            if latest.load(Ordering::SeqCst) == generation {
                sender.send_replace(suggestions);
            }
        };

        let handle = match &self.runtime {
            Some(runtime) => runtime.spawn(task),
            None => tokio::spawn(task),
        };
        self.lookup.set(handle);
    }

    /// Pick a suggestion: clears the list and returns its coordinate.
    pub fn select(&mut self, suggestion: &GeocodeSuggestion) -> Coordinate {
        self.lookup.cancel();
        self.latest.fetch_add(1, Ordering::SeqCst);
        self.sender.send_replace(Vec::new());
        suggestion.coordinate()
    }

    pub fn is_pending(&self) -> bool {
        self.lookup.is_running()
    }
}

// ============================================================================
// Nominatim
// ============================================================================

/// One item of a Nominatim `/search?format=json` response
#[derive(Debug, Deserialize)]
struct NominatimPlace {
    place_id: u64,
    display_name: String,
    /// Decimal degrees as a string
    lat: String,
    lon: String,
}

/// Parse a Nominatim JSON search response. Items with unparseable
/// coordinates are skipped.
pub fn parse_search_response(body: &[u8]) -> Result<Vec<GeocodeSuggestion>> {
    let places: Vec<NominatimPlace> = serde_json::from_slice(body)
        .map_err(|e| RunaRouteError::geocode_fetch(format!("JSON parse error: {}", e)))?;

    Ok(places
        .into_iter()
        .filter_map(|place| {
            match (place.lat.parse::<f64>(), place.lon.parse::<f64>()) {
                (Ok(latitude), Ok(longitude)) => Some(GeocodeSuggestion {
                    id: place.place_id,
                    display_name: place.display_name,
                    latitude,
                    longitude,
                }),
                _ => {
                    debug!(
                        "[Nominatim] Skipping place {} with coordinates ({}, {})",
                        place.place_id, place.lat, place.lon
                    );
                    None
                }
            }
        })
        .collect())
}

#[cfg(feature = "http")]
pub use nominatim::NominatimGeocoder;

#[cfg(feature = "http")]
mod nominatim {
    use super::*;
    use reqwest::Client;

    /// Nominatim forward geocoder.
    pub struct NominatimGeocoder {
        client: Client,
        config: GeocodingConfig,
    }

    impl NominatimGeocoder {
        pub fn new() -> Result<Self> {
            Self::with_config(GeocodingConfig::default())
        }

        pub fn with_config(config: GeocodingConfig) -> Result<Self> {
            let client = Client::builder()
                .user_agent(config.user_agent.clone())
                .timeout(config.timeout)
                .build()
                .map_err(|e| RunaRouteError::ConfigError {
                    message: format!("Failed to create HTTP client: {}", e),
                })?;
            Ok(Self { client, config })
        }
    }

    impl GeocodeProvider for NominatimGeocoder {
        async fn search(&self, query: &AddressQuery) -> Result<Vec<GeocodeSuggestion>> {
            let url = format!("{}/search", self.config.base_url.trim_end_matches('/'));
            let resp = self
                .client
                .get(&url)
                .query(&[("format", "json"), ("q", query.as_str())])
                .header("Accept-Language", &self.config.accept_language)
                .send()
                .await
                .map_err(|e| RunaRouteError::geocode_fetch(format!("Request error: {}", e)))?;

            let status = resp.status();
            if !status.is_success() {
                return Err(RunaRouteError::geocode_fetch(format!("HTTP {}", status)));
            }

            let bytes = resp.bytes().await.map_err(|e| {
                RunaRouteError::geocode_fetch(format!("Body download error: {}", e))
            })?;
            let suggestions = parse_search_response(&bytes)?;
            debug!(
                "[Nominatim] {} suggestions for '{}'",
                suggestions.len(),
                query.as_str()
            );
            Ok(suggestions)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeGeocoder {
        queries: Mutex<Vec<String>>,
        fail: bool,
    }

    impl GeocodeProvider for FakeGeocoder {
        async fn search(&self, query: &AddressQuery) -> Result<Vec<GeocodeSuggestion>> {
            self.queries.lock().unwrap().push(query.as_str().to_string());
            if self.fail {
                return Err(RunaRouteError::geocode_fetch("HTTP 503 Service Unavailable"));
            }
            Ok(vec![GeocodeSuggestion {
                id: 1,
                display_name: format!("{}, Denmark", query.as_str()),
                latitude: 55.6761,
                longitude: 12.5683,
            }])
        }
    }

    fn autocomplete(fail: bool) -> (AddressAutocomplete<Arc<FakeGeocoder>>, Arc<FakeGeocoder>) {
        let geocoder = Arc::new(FakeGeocoder {
            fail,
            ..Default::default()
        });
        let ac = AddressAutocomplete::new(Arc::clone(&geocoder), &GeocodingConfig::default());
        (ac, geocoder)
    }

    #[test]
    fn test_normalize_query() {
        assert_eq!(AddressQuery::normalize("  ab  "), None);
        assert_eq!(AddressQuery::normalize(""), None);
        assert_eq!(
            AddressQuery::normalize("  Nørre ").unwrap().as_str(),
            "Nørre"
        );
        assert_eq!(AddressQuery::normalize("abc").unwrap().as_str(), "abc");
        // Characters, not bytes
        assert_eq!(AddressQuery::normalize("øæ"), None);
    }

    #[test]
    fn test_parse_search_response() {
        let body = r#"[
            {"place_id": 123, "licence": "ODbL", "display_name": "Copenhagen, Denmark",
             "lat": "55.6867243", "lon": "12.5700724", "type": "city"},
            {"place_id": 124, "display_name": "Broken", "lat": "n/a", "lon": "12.0"}
        ]"#;
        let suggestions = parse_search_response(body.as_bytes()).unwrap();
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].id, 123);
        assert_eq!(suggestions[0].display_name, "Copenhagen, Denmark");
        assert!((suggestions[0].latitude - 55.6867243).abs() < 1e-9);

        assert!(matches!(
            parse_search_response(b"{\"error\": \"bad\"}"),
            Err(RunaRouteError::GeocodeFetchFailed { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_input_never_queries() {
        let (mut ac, geocoder) = autocomplete(false);
        ac.input_changed("Co");
        ac.input_changed("   ab   ");
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert!(geocoder.queries.lock().unwrap().is_empty());
        assert!(ac.suggestions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_edits_single_lookup() {
        let (mut ac, geocoder) = autocomplete(false);
        let rx = ac.subscribe();

        ac.input_changed("Cop");
        tokio::time::sleep(Duration::from_millis(200)).await;
        ac.input_changed("Copen");
        tokio::time::sleep(Duration::from_millis(300)).await;
        ac.input_changed("Copenhagen");
        tokio::time::sleep(Duration::from_millis(599)).await;
        assert!(geocoder.queries.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(*geocoder.queries.lock().unwrap(), vec!["Copenhagen".to_string()]);
        assert_eq!(rx.borrow()[0].display_name, "Copenhagen, Denmark");
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_input_clears_previous_results() {
        let (mut ac, _) = autocomplete(false);
        ac.input_changed("Aarhus");
        tokio::time::sleep(Duration::from_millis(700)).await;
        assert_eq!(ac.suggestions().len(), 1);

        ac.input_changed("Aa");
        assert!(ac.suggestions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_publishes_empty() {
        let (mut ac, geocoder) = autocomplete(true);
        ac.input_changed("Odense");
        tokio::time::sleep(Duration::from_millis(700)).await;

        assert_eq!(geocoder.queries.lock().unwrap().len(), 1);
        assert!(ac.suggestions().is_empty());
        assert!(!ac.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_select_clears_and_returns_coordinate() {
        let (mut ac, _) = autocomplete(false);
        ac.input_changed("Copenhagen");
        tokio::time::sleep(Duration::from_millis(700)).await;

        let picked = ac.suggestions()[0].clone();
        let coord = ac.select(&picked);
        assert_eq!(coord, Coordinate::new(55.6761, 12.5683));
        assert!(ac.suggestions().is_empty());
    }
}
