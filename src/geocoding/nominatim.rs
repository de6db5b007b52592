use crate::config::GeocodingConfig;
use crate::crawler::CoordinateResolver;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct Place {
    lat: String,
    lon: String,
}

/// Accepted coordinate area
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl Bounds {
    /// From `[min-lat, max-lat, min-lon, max-lon]`
    pub fn from_array(bounds: [f64; 4]) -> Self {
        Self {
            min_lat: bounds[0],
            max_lat: bounds[1],
            min_lon: bounds[2],
            max_lon: bounds[3],
        }
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&lat) && (self.min_lon..=self.max_lon).contains(&lon)
    }
}

/// Coordinate resolver backed by a Nominatim search endpoint
///
/// Transport and HTTP failures are retried with `2^attempt` backoff; an
/// empty answer, an unparseable answer or a point outside the bounds ends
/// the lookup with `None`.
#[derive(Debug, Clone)]
pub struct NominatimResolver {
    client: Client,
    endpoint: String,
    country_code: String,
    max_retries: u32,
    bounds: Bounds,
    backoff_unit: Duration,
}

impl NominatimResolver {
    pub fn new(client: Client, config: &GeocodingConfig) -> Self {
        Self {
            client,
            endpoint: config.endpoint.clone(),
            country_code: config.country_code.clone(),
            max_retries: config.max_retries.max(1),
            bounds: Bounds::from_array(config.bounds),
            backoff_unit: Duration::from_secs(1),
        }
    }

    /// Overrides the one-second unit of the retry backoff
    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    async fn request(&self, query: &str) -> Result<Vec<Place>, reqwest::Error> {
        self.client
            .get(&self.endpoint)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("limit", "1"),
                ("countrycodes", self.country_code.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<Place>>()
            .await
    }

    fn accept(&self, query: &str, place: &Place) -> Option<(f64, f64)> {
        let (Ok(lat), Ok(lon)) = (place.lat.parse::<f64>(), place.lon.parse::<f64>()) else {
            warn!("Unparseable coordinates for '{}': {:?}", query, place);
            return None;
        };

        if self.bounds.contains(lat, lon) {
            debug!("Resolved '{}' to {}, {}", query, lat, lon);
            Some((lat, lon))
        } else {
            warn!("Coordinates for '{}' outside bounds: {}, {}", query, lat, lon);
            None
        }
    }
}

#[async_trait]
impl CoordinateResolver for NominatimResolver {
    async fn resolve(&self, query: &str) -> Option<(f64, f64)> {
        for attempt in 0..self.max_retries {
            match self.request(query).await {
                Ok(places) => {
                    return places.first().and_then(|place| self.accept(query, place));
                }
                Err(e) if e.is_decode() => {
                    warn!("Unreadable geocoding response for '{}': {}", query, e);
                    return None;
                }
                Err(e) => {
                    warn!(
                        "Geocoding request failed (attempt {}/{}): {}",
                        attempt + 1,
                        self.max_retries,
                        e
                    );
                    if attempt + 1 < self.max_retries {
                        tokio::time::sleep(self.backoff_unit * 2u32.pow(attempt.min(10))).await;
                    }
                }
            }
        }
        None
    }
}
