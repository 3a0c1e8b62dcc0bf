use std::collections::BTreeMap;
use tracing::{debug, warn};

use geoseek_core::config::SpatialScoring;
use geoseek_core::geo::{Extent, Geometry, SpatialRelation};
use geoseek_core::traits::DatasetIndex;
use geoseek_core::{DatasetId, Error, ErrorKind, Result};

/// Matching datasets and their spatial score in [0, 1].
pub type SpatialMatches = BTreeMap<DatasetId, f32>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpatialOutcome {
    pub matches: SpatialMatches,
    /// The spatial index failed and every footprint was tested instead.
    pub full_scan: bool,
}

/// Restricts the catalog to datasets whose footprint relates to a query area.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpatialFilter {
    scoring: SpatialScoring,
}

impl SpatialFilter {
    pub fn new(scoring: SpatialScoring) -> Self {
        Self { scoring }
    }

    pub async fn filter(&self, index: &dyn DatasetIndex, extent: &Extent, relation: SpatialRelation) -> Result<SpatialOutcome> {
        match index.spatial_query(extent, relation).await {
            Ok(ids) => {
                debug!(matches = ids.len(), %relation, "spatial index query");
                let matches = match self.scoring {
                    SpatialScoring::Binary => ids.into_iter().map(|id| (id, 1.0)).collect(),
                    SpatialScoring::OverlapRatio => {
                        let ids: Vec<DatasetId> = ids.into_iter().collect();
                        let records = index.lookup_by_ids(&ids).await?;
                        ids.into_iter()
                            .map(|id| {
                                let score = records
                                    .get(&id)
                                    .and_then(|r| r.geometry.as_ref())
                                    .map(|g| g.overlap_fraction(extent))
                                    .unwrap_or(0.0);
                                (id, score)
                            })
                            .collect()
                    }
                };
                Ok(SpatialOutcome { matches, full_scan: false })
            }
            Err(e) if e.kind() == ErrorKind::IndexUnavailable => {
                warn!(error = %e, "spatial index unavailable; degraded mode, scanning all footprints");
                let footprints = index.footprints().await.map_err(|scan_err| {
                    Error::IndexUnavailable(format!("spatial index failed ({e}) and full scan failed ({scan_err})"))
                })?;
                let matches = self.scan(&footprints, extent, relation);
                debug!(scanned = footprints.len(), matches = matches.len(), "full scan finished");
                Ok(SpatialOutcome { matches, full_scan: true })
            }
            Err(e) => Err(e),
        }
    }

    /// Exact relation test over an explicit footprint list.
    pub fn scan(&self, footprints: &[(DatasetId, Geometry)], extent: &Extent, relation: SpatialRelation) -> SpatialMatches {
        footprints
            .iter()
            .filter(|(_, g)| g.relates(relation, extent))
            .map(|(id, g)| {
                let score = match self.scoring {
                    SpatialScoring::Binary => 1.0,
                    SpatialScoring::OverlapRatio => g.overlap_fraction(extent),
                };
                (id.clone(), score)
            })
            .collect()
    }
}
