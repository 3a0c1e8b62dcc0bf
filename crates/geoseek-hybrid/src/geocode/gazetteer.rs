use async_trait::async_trait;
use std::collections::HashMap;

use geoseek_core::config::GazetteerEntry;
use geoseek_core::geo::Extent;
use geoseek_core::traits::{GeocodeMatch, Geocoder};
use geoseek_core::{Error, Result};

/// Static, case-insensitive place table loaded from configuration.
#[derive(Debug, Clone, Default)]
pub struct Gazetteer {
    places: HashMap<String, Vec<GeocodeMatch>>,
}

impl Gazetteer {
    pub fn from_entries(entries: &[GazetteerEntry]) -> Result<Self> {
        let mut g = Self::default();
        for e in entries {
            let extent = Extent::from_wrapping(e.west, e.south, e.east, e.north)
                .map_err(|err| Error::InvalidConfig(format!("gazetteer entry '{}': {err}", e.name)))?;
            g.insert(&e.name, extent, e.confidence);
        }
        Ok(g)
    }

    pub fn insert(&mut self, name: &str, extent: Extent, confidence: f64) {
        let key = super::normalize(name).to_lowercase();
        self.places.entry(key).or_default().push(GeocodeMatch {
            display_name: super::normalize(name),
            extent,
            confidence,
        });
    }

    pub fn len(&self) -> usize { self.places.len() }

    pub fn is_empty(&self) -> bool { self.places.is_empty() }
}

#[async_trait]
impl Geocoder for Gazetteer {
    fn name(&self) -> &str { "gazetteer" }

    async fn geocode(&self, place_name: &str) -> Result<Vec<GeocodeMatch>> {
        let key = super::normalize(place_name).to_lowercase();
        Ok(self.places.get(&key).cloned().unwrap_or_default())
    }
}
