//! Nominatim (`/search?format=jsonv2`) backend.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use geoseek_core::geo::Extent;
use geoseek_core::traits::{GeocodeMatch, Geocoder};
use geoseek_core::{Error, Result};

const RESULT_LIMIT: &str = "5";

pub struct NominatimGeocoder {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Place {
    display_name: String,
    /// `[south, north, west, east]` as strings.
    boundingbox: [String; 4],
    #[serde(default)]
    importance: Option<f64>,
}

impl NominatimGeocoder {
    pub fn new(base_url: &str, user_agent: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().user_agent(user_agent).build()?;
        Ok(Self { client, base_url: base_url.trim_end_matches('/').to_string() })
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    fn name(&self) -> &str { "nominatim" }

    async fn geocode(&self, place_name: &str) -> Result<Vec<GeocodeMatch>> {
        let url = format!("{}/search", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("q", place_name), ("format", "jsonv2"), ("limit", RESULT_LIMIT)])
            .send()
            .await
            .map_err(|e| Error::GeocodeUnavailable(format!("Nominatim HTTP error: {e}")))?;
        if !response.status().is_success() {
            return Err(Error::GeocodeUnavailable(format!("Nominatim returned {}", response.status())));
        }
        let places: Vec<Place> = response
            .json()
            .await
            .map_err(|e| Error::GeocodeUnavailable(format!("Nominatim JSON parse error: {e}")))?;
        debug!(place = place_name, candidates = places.len(), "nominatim search");
        Ok(places.into_iter().filter_map(to_match).collect())
    }
}

/// Places with unparsable or degenerate boxes are dropped.
pub(crate) fn to_match(place: Place) -> Option<GeocodeMatch> {
    let [south, north, west, east] = &place.boundingbox;
    let south: f64 = south.trim().parse().ok()?;
    let north: f64 = north.trim().parse().ok()?;
    let west: f64 = west.trim().parse().ok()?;
    let east: f64 = east.trim().parse().ok()?;
    let extent = Extent::from_wrapping(west, south, east, north).ok()?;
    Some(GeocodeMatch { display_name: place.display_name, extent, confidence: place.importance.unwrap_or(0.0) })
}
