//! Place-name resolution.
//!
//! [`GeocoderAdapter`] sits in front of a [`Geocoder`] backend: it normalises
//! the name, bounds the call with a timeout, keeps only the best match and
//! caches resolved outcomes (including "not found"). Backend unavailability
//! is never cached.

use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use geoseek_core::config::{GeocoderBackend, GeocoderSettings};
use geoseek_core::geo::Extent;
use geoseek_core::traits::{GeocodeMatch, Geocoder};
use geoseek_core::{Error, Result};

pub mod gazetteer;
pub mod nominatim;

pub use gazetteer::Gazetteer;
pub use nominatim::NominatimGeocoder;

pub struct GeocoderAdapter {
    backend: Arc<dyn Geocoder>,
    timeout: Duration,
    cache: Cache<String, Option<Extent>>,
}

impl GeocoderAdapter {
    pub fn new(backend: Arc<dyn Geocoder>, timeout: Duration, cache_capacity: u64) -> Self {
        Self {
            backend,
            timeout,
            cache: Cache::builder().max_capacity(cache_capacity).time_to_live(Duration::from_secs(86_400)).build(),
        }
    }

    pub fn backend_name(&self) -> &str { self.backend.name() }

    /// `Ok(None)` when the place is unknown.
    pub async fn resolve(&self, place_name: &str) -> Result<Option<Extent>> {
        let name = normalize(place_name);
        if name.is_empty() {
            return Err(Error::invalid("place name is empty"));
        }
        let key = name.to_lowercase();
        if let Some(hit) = self.cache.get(&key).await {
            debug!(place = %name, "geocode cache hit");
            return Ok(hit);
        }

        let matches = match tokio::time::timeout(self.timeout, self.backend.geocode(&name)).await {
            Ok(Ok(m)) => m,
            Ok(Err(e)) => {
                warn!(backend = self.backend.name(), place = %name, error = %e, "geocoder failed");
                return Err(match e {
                    Error::GeocodeUnavailable(_) => e,
                    other => Error::GeocodeUnavailable(other.to_string()),
                });
            }
            Err(_) => {
                warn!(backend = self.backend.name(), place = %name, timeout_ms = self.timeout.as_millis() as u64, "geocoder timed out");
                return Err(Error::GeocodeUnavailable(format!("timed out after {:?}", self.timeout)));
            }
        };

        let best = best_match(matches);
        match &best {
            Some(m) => debug!(place = %name, resolved = %m.display_name, extent = %m.extent, "geocoded"),
            None => debug!(place = %name, "place not found"),
        }
        let extent = best.map(|m| m.extent);
        self.cache.insert(key, extent.clone()).await;
        Ok(extent)
    }
}

/// Trim and collapse internal whitespace.
pub fn normalize(place_name: &str) -> String {
    place_name.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Highest confidence; the first returned wins ties.
fn best_match(matches: Vec<GeocodeMatch>) -> Option<GeocodeMatch> {
    matches.into_iter().fold(None, |best, m| match best {
        Some(b) if b.confidence >= m.confidence => Some(b),
        _ => Some(m),
    })
}

pub fn geocoder_from_settings(settings: &GeocoderSettings) -> anyhow::Result<Arc<dyn Geocoder>> {
    let geocoder: Arc<dyn Geocoder> = match settings.backend {
        GeocoderBackend::Nominatim => Arc::new(NominatimGeocoder::new(&settings.base_url, &settings.user_agent)?),
        GeocoderBackend::Gazetteer => Arc::new(Gazetteer::from_entries(&settings.gazetteer)?),
    };
    Ok(geocoder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoseek_core::geo::BoundingBox;

    fn m(name: &str, confidence: f64) -> GeocodeMatch {
        GeocodeMatch {
            display_name: name.into(),
            extent: Extent::single(BoundingBox::new(0.0, 0.0, 1.0, 1.0).unwrap()),
            confidence,
        }
    }

    #[test]
    fn best_match_prefers_confidence_then_order() {
        assert_eq!(best_match(vec![m("a", 0.2), m("b", 0.9), m("c", 0.9)]).unwrap().display_name, "b");
        assert!(best_match(Vec::new()).is_none());
    }

    #[test]
    fn normalize_collapses_whitespace() {
        assert_eq!(normalize("  New   York\tCity "), "New York City");
    }
}
