use crate::fetch::Fetcher;
use crate::{fan_out, Collector, CollectorSettings, SearchScope};
use async_trait::async_trait;
use firmy_core::{Candidate, CandidatePolicy};
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const GEOCODE_BASE_URL: &str = "https://maps.googleapis.com";
pub const PLACES_BASE_URL: &str = "https://places.googleapis.com";

const FIELD_MASK: &str = "places.id,places.displayName,places.formattedAddress,places.googleMapsUri,places.internationalPhoneNumber,places.websiteUri,nextPageToken";
const METERS_PER_DEGREE: f64 = 111_000.0;
const NO_NAME: &str = "Brak nazwy";
const NO_ADDRESS: &str = "Brak adresu";

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatLng {
    pub latitude: f64,
    pub longitude: f64,
}

/// Rectangle passed as the Places `locationRestriction`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub low: LatLng,
    pub high: LatLng,
}

/// Approximates a circle of `radius_m` around a point with a lat/lng box.
pub fn calculate_bounds(lat: f64, lng: f64, radius_m: u32) -> Bounds {
    let radius = radius_m as f64;
    let delta_lat = radius / METERS_PER_DEGREE;
    let delta_lng = radius / (METERS_PER_DEGREE * lat.to_radians().cos().abs() + 1e-6);

    Bounds {
        low: LatLng {
            latitude: lat - delta_lat,
            longitude: lng - delta_lng,
        },
        high: LatLng {
            latitude: lat + delta_lat,
            longitude: lng + delta_lng,
        },
    }
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    results: Vec<GeocodeResult>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: Coordinates,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchTextRequest<'a> {
    text_query: &'a str,
    location_restriction: LocationRestriction,
    #[serde(skip_serializing_if = "Option::is_none")]
    page_token: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct LocationRestriction {
    rectangle: Bounds,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchTextResponse {
    #[serde(default)]
    places: Vec<Place>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Place {
    display_name: Option<LocalizedText>,
    formatted_address: Option<String>,
    international_phone_number: Option<String>,
    website_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LocalizedText {
    #[serde(default)]
    text: String,
}

impl Place {
    fn into_candidate(self, term: &str) -> Candidate {
        Candidate {
            name: Some(
                self.display_name
                    .map(|name| name.text)
                    .filter(|text| !text.trim().is_empty())
                    .unwrap_or_else(|| NO_NAME.to_string()),
            ),
            address: Some(
                self.formatted_address
                    .unwrap_or_else(|| NO_ADDRESS.to_string()),
            ),
            phone: self.international_phone_number,
            website: self.website_uri.filter(|site| !site.trim().is_empty()),
            ..Candidate::new("places", term)
        }
    }
}

/// Google Places text search: geocodes a place, then runs one paginated
/// search per category inside a box around it.
pub struct PlacesCollector {
    fetcher: Fetcher,
    api_key: String,
    geocode_base: String,
    places_base: String,
    concurrency: usize,
    page_delay: Duration,
}

impl PlacesCollector {
    pub fn new(fetcher: Fetcher, api_key: String, settings: &CollectorSettings) -> Self {
        Self {
            fetcher,
            api_key,
            geocode_base: GEOCODE_BASE_URL.to_string(),
            places_base: PLACES_BASE_URL.to_string(),
            concurrency: settings.concurrency,
            page_delay: settings.page_delay,
        }
    }

    pub fn with_base_urls(mut self, geocode: impl Into<String>, places: impl Into<String>) -> Self {
        self.geocode_base = geocode.into();
        self.places_base = places.into();
        self
    }

    pub async fn geocode(&self, place: &str) -> Option<Coordinates> {
        let url = format!("{}/maps/api/geocode/json", self.geocode_base);
        let query = [("address", place), ("key", self.api_key.as_str())];

        let response = match self.fetcher.send(|client| client.get(&url).query(&query)).await {
            Ok(response) => response,
            Err(e) => {
                error!("Geocoding '{}' failed: {}", place, e);
                return None;
            }
        };

        let body: GeocodeResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                error!("Unexpected geocode response for '{}': {}", place, e);
                return None;
            }
        };

        match body.results.into_iter().next() {
            Some(result) => {
                debug!("Geocoded '{}' to {:?}", place, result.geometry.location);
                Some(result.geometry.location)
            }
            None => {
                warn!(
                    "No coordinates found for '{}' (status {})",
                    place,
                    body.status.as_deref().unwrap_or("unknown")
                );
                None
            }
        }
    }

    /// Runs one text search, following `nextPageToken` until the API stops
    /// returning one. A failed page ends the search with what was read so far.
    pub async fn search_term(&self, term: &str, bounds: &Bounds) -> Vec<Candidate> {
        let url = format!("{}/v1/places:searchText", self.places_base);
        let mut candidates = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            if page_token.is_some() {
                // the API rejects a page token that is used too soon
                tokio::time::sleep(self.page_delay).await;
            }

            let request = SearchTextRequest {
                text_query: term,
                location_restriction: LocationRestriction { rectangle: *bounds },
                page_token: page_token.as_deref(),
            };

            let response = match self
                .fetcher
                .send(|client| {
                    client
                        .post(&url)
                        .header("X-Goog-Api-Key", self.api_key.as_str())
                        .header("X-Goog-FieldMask", FIELD_MASK)
                        .json(&request)
                })
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    error!("Places search [{}] failed: {}", term, e);
                    break;
                }
            };

            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .unwrap_or_default()
                .to_string();
            if !content_type.starts_with("application/json") {
                let body = response.text().await.unwrap_or_default();
                error!(
                    "Unexpected response type for [{}]: {}, body: {}",
                    term, content_type, body
                );
                break;
            }

            let page: SearchTextResponse = match response.json().await {
                Ok(page) => page,
                Err(e) => {
                    error!("Malformed places response for [{}]: {}", term, e);
                    break;
                }
            };

            debug!("[{}] page returned {} places", term, page.places.len());
            candidates.extend(page.places.into_iter().map(|place| place.into_candidate(term)));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        candidates
    }
}

#[async_trait]
impl Collector for PlacesCollector {
    fn name(&self) -> &'static str {
        "places"
    }

    fn default_policy(&self) -> CandidatePolicy {
        CandidatePolicy::PhoneAndWebsite
    }

    async fn collect(&self, scope: &SearchScope) -> Vec<Candidate> {
        let SearchScope::Area {
            place,
            radius_m,
            categories,
        } = scope
        else {
            warn!("The places collector needs an area to search");
            return Vec::new();
        };

        let Some(location) = self.geocode(place).await else {
            return Vec::new();
        };

        let bounds = calculate_bounds(location.lat, location.lng, *radius_m);
        info!(
            "Searching {} categories around {} ({} m)",
            categories.len(),
            place,
            radius_m
        );

        let bounds = &bounds;
        fan_out(categories.clone(), self.concurrency, |term| async move {
            self.search_term(&term, bounds).await
        })
        .await
    }
}
