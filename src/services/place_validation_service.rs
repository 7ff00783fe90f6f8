use std::env;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};

const PLACES_API_BASE_URL: &str = "https://places.googleapis.com/v1/places:searchText";
const PLACES_FIELD_MASK: &str =
    "places.id,places.displayName,places.formattedAddress,places.location,places.rating,places.types";

pub const DEFAULT_CHUNK_SIZE: usize = 10;
pub const DEFAULT_THROTTLE: Duration = Duration::from_millis(100);

/// One venue to check against the places backend.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PlaceQuery {
    pub place_name: String,
    pub location: String,
    #[serde(rename = "type", default)]
    pub category: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PlaceValidationResult {
    pub place_id: String,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    pub address: String,
    pub rating: Option<f64>,
    pub google_maps_link: String,
    pub types: Vec<String>,
}

/// Place-lookup collaborator. A failed lookup is `None`, never an error:
/// a venue the backend cannot confirm simply stays unvalidated.
#[async_trait]
pub trait PlaceLookup: Send + Sync {
    async fn validate_place(&self, query: &PlaceQuery) -> Option<PlaceValidationResult>;
}

/// Validate a list of places with bounded burst concurrency: fixed-size
/// chunks run concurrently, with a throttle delay between chunks (not
/// after the last). Results come back in request order, one slot per
/// query.
pub async fn validate_batch(
    lookup: &dyn PlaceLookup,
    queries: &[PlaceQuery],
    chunk_size: usize,
    throttle: Duration,
) -> Vec<Option<PlaceValidationResult>> {
    let mut results = Vec::with_capacity(queries.len());
    let chunks: Vec<&[PlaceQuery]> = queries.chunks(chunk_size.max(1)).collect();

    for (i, chunk) in chunks.iter().enumerate() {
        let lookups = chunk.iter().map(|query| lookup.validate_place(query));
        results.extend(join_all(lookups).await);

        if i + 1 < chunks.len() {
            tokio::time::sleep(throttle).await;
        }
    }

    results
}

// Wire format for the Places searchText endpoint.

#[derive(Debug, Serialize)]
struct SearchTextRequest {
    #[serde(rename = "textQuery")]
    text_query: String,
    #[serde(rename = "languageCode")]
    language_code: String,
}

#[derive(Debug, Deserialize)]
struct SearchTextResponse {
    #[serde(default)]
    places: Vec<PlaceHit>,
}

#[derive(Debug, Deserialize)]
struct PlaceHit {
    id: String,
    #[serde(rename = "displayName")]
    display_name: Option<DisplayName>,
    #[serde(rename = "formattedAddress")]
    formatted_address: Option<String>,
    location: Option<LatLng>,
    rating: Option<f64>,
    #[serde(default)]
    types: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct DisplayName {
    text: String,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    latitude: f64,
    longitude: f64,
}

pub struct GooglePlacesClient {
    http_client: reqwest::Client,
    api_key: Option<String>,
}

impl GooglePlacesClient {
    /// A missing key is not fatal here: place validation fails open so a
    /// misconfigured places backend degrades generation instead of
    /// aborting it.
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let api_key = env::var("GOOGLE_PLACES_API_KEY").ok();
        if api_key.is_none() {
            eprintln!("GOOGLE_PLACES_API_KEY is not configured; place validation disabled");
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http_client,
            api_key,
        })
    }
}

#[async_trait]
impl PlaceLookup for GooglePlacesClient {
    async fn validate_place(&self, query: &PlaceQuery) -> Option<PlaceValidationResult> {
        let api_key = self.api_key.as_ref()?;

        let text_query = format!(
            "{} {} {}",
            query.category, query.place_name, query.location
        );
        println!(
            "[Validation] Checking \"{}\" in \"{}\"...",
            query.place_name, query.location
        );

        let response = self
            .http_client
            .post(PLACES_API_BASE_URL)
            .header("X-Goog-Api-Key", api_key)
            .header("X-Goog-FieldMask", PLACES_FIELD_MASK)
            .json(&SearchTextRequest {
                text_query: text_query.trim().to_string(),
                language_code: "en".to_string(),
            })
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(err) => {
                eprintln!("Error validating place \"{}\": {}", query.place_name, err);
                return None;
            }
        };

        let data: SearchTextResponse = match response.json().await {
            Ok(data) => data,
            Err(err) => {
                eprintln!(
                    "Failed to parse places response for \"{}\": {}",
                    query.place_name, err
                );
                return None;
            }
        };

        let place = match data.places.into_iter().next() {
            Some(place) => place,
            None => {
                eprintln!(
                    "No places found for \"{}\" in \"{}\"",
                    query.place_name, query.location
                );
                return None;
            }
        };

        let result = PlaceValidationResult {
            google_maps_link: format!(
                "https://www.google.com/maps/place/?q=place_id:{}",
                place.id
            ),
            name: place
                .display_name
                .map(|name| name.text)
                .unwrap_or_else(|| query.place_name.clone()),
            lat: place.location.as_ref().map(|l| l.latitude).unwrap_or(0.0),
            lng: place.location.as_ref().map(|l| l.longitude).unwrap_or(0.0),
            address: place.formatted_address.unwrap_or_default(),
            rating: place.rating,
            types: place.types,
            place_id: place.id,
        };

        println!("Validated \"{}\" ({})", result.name, result.place_id);
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scripted lookup: fails every query whose name contains "missing",
    /// and tracks how many lookups run at once.
    struct ScriptedLookup {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedLookup {
        fn new() -> Self {
            Self {
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PlaceLookup for ScriptedLookup {
        async fn validate_place(&self, query: &PlaceQuery) -> Option<PlaceValidationResult> {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);
            self.calls.lock().unwrap().push(query.place_name.clone());

            // Force overlap within a chunk.
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if query.place_name.contains("missing") {
                return None;
            }
            Some(PlaceValidationResult {
                place_id: format!("id-{}", query.place_name),
                name: query.place_name.clone(),
                lat: 1.0,
                lng: 2.0,
                address: String::new(),
                rating: None,
                google_maps_link: String::new(),
                types: vec![],
            })
        }
    }

    fn queries(n: usize) -> Vec<PlaceQuery> {
        (0..n)
            .map(|i| PlaceQuery {
                place_name: if i == 7 {
                    "missing-7".to_string()
                } else {
                    format!("place-{}", i)
                },
                location: "Rome".to_string(),
                category: "museum".to_string(),
            })
            .collect()
    }

    #[actix_web::test]
    async fn test_batch_preserves_order_and_marks_failures() {
        let lookup = ScriptedLookup::new();
        let queries = queries(25);

        let results =
            validate_batch(&lookup, &queries, 10, Duration::from_millis(20)).await;

        assert_eq!(results.len(), 25);
        assert!(results[7].is_none());
        for (i, result) in results.iter().enumerate() {
            if i == 7 {
                continue;
            }
            assert_eq!(
                result.as_ref().map(|r| r.name.as_str()),
                Some(format!("place-{}", i).as_str())
            );
        }
    }

    #[actix_web::test]
    async fn test_batch_bounds_concurrency_to_chunk_size() {
        let lookup = ScriptedLookup::new();
        let queries = queries(25);

        let started = std::time::Instant::now();
        validate_batch(&lookup, &queries, 10, Duration::from_millis(100)).await;
        let elapsed = started.elapsed();

        assert!(lookup.max_in_flight.load(Ordering::SeqCst) <= 10);
        // 25 queries at chunk size 10 means three chunks: the throttle runs
        // after the first two chunks and not after the last, so the elapsed
        // time sits between two and three throttle periods.
        assert!(elapsed >= Duration::from_millis(200));
        assert!(elapsed < Duration::from_millis(300));
        assert_eq!(lookup.calls.lock().unwrap().len(), 25);
    }

    #[actix_web::test]
    async fn test_empty_batch_returns_no_results() {
        let lookup = ScriptedLookup::new();
        let results = validate_batch(&lookup, &[], 10, DEFAULT_THROTTLE).await;
        assert!(results.is_empty());
    }
}
