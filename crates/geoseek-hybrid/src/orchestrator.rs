//! Per-query retrieval pipeline.
//!
//! ```text
//! ReceivedQuery -> IntentExtracted -> {SpatiallyFiltered | SpatialSkipped}
//!   -> SemanticallyRanked -> Merged -> [Synthesized] -> Done
//! ```
//!
//! The geocode+spatial branch and the semantic branch read the same index
//! snapshot and run concurrently inside one future; dropping that future
//! cancels both. Every degradation is reported in [`Degradations`].

use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use geoseek_core::config::RetrievalSettings;
use geoseek_core::geo::{Extent, SpatialRelation};
use geoseek_core::traits::DatasetIndex;
use geoseek_core::{
    DatasetId, Degradations, Error, ErrorKind, IndexHandle, Query, RankedDataset, Result, RetrievalRequest,
    RetrievalResult, SpatialSkip, Stage,
};
use geoseek_spatial::{SpatialFilter, SpatialOutcome};
use geoseek_vector::SemanticRanker;

use crate::geocode::GeocoderAdapter;
use crate::intent::IntentExtractor;
use crate::merge::HybridMerger;
use crate::synthesize::{AnswerSynthesizer, NO_MATCHES_MESSAGE};

/// Collaborators of one orchestrator.
pub struct Components {
    pub intent: IntentExtractor,
    pub geocoder: GeocoderAdapter,
    pub ranker: SemanticRanker,
    pub synthesizer: Option<AnswerSynthesizer>,
}

pub struct Orchestrator {
    index: Arc<IndexHandle>,
    intent: IntentExtractor,
    geocoder: GeocoderAdapter,
    spatial: SpatialFilter,
    ranker: SemanticRanker,
    merger: HybridMerger,
    synthesizer: Option<AnswerSynthesizer>,
    relation: SpatialRelation,
    default_top_k: usize,
    max_top_k: usize,
    candidate_pool: usize,
}

enum SpatialBranch {
    Applied { extent: Extent, outcome: SpatialOutcome },
    Skipped(SpatialSkip),
}

impl Orchestrator {
    pub fn new(index: Arc<IndexHandle>, components: Components, settings: &RetrievalSettings) -> Result<Self> {
        if settings.default_top_k == 0 || settings.default_top_k > settings.max_top_k {
            return Err(Error::InvalidConfig(format!(
                "default_top_k {} outside 1..={}",
                settings.default_top_k, settings.max_top_k
            )));
        }
        let merger = HybridMerger::new(settings.alpha).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        Ok(Self {
            index,
            intent: components.intent,
            geocoder: components.geocoder,
            spatial: SpatialFilter::new(settings.spatial_scoring),
            ranker: components.ranker,
            merger,
            synthesizer: components.synthesizer,
            relation: settings.relation,
            default_top_k: settings.default_top_k,
            max_top_k: settings.max_top_k,
            candidate_pool: settings.candidate_pool,
        })
    }

    /// Runs the query, or returns `Error::Cancelled` as soon as `cancel`
    /// completes. Outstanding external calls are dropped with the query.
    pub async fn retrieve_until<C>(&self, request: RetrievalRequest, cancel: C) -> Result<RetrievalResult>
    where
        C: Future<Output = ()>,
    {
        tokio::select! {
            biased;
            _ = cancel => {
                info!("query cancelled by caller");
                Err(Error::Cancelled)
            }
            result = self.retrieve(request) => result,
        }
    }

    #[instrument(name = "query", skip(self, request), fields(request_id = %uuid::Uuid::new_v4()))]
    pub async fn retrieve(&self, request: RetrievalRequest) -> Result<RetrievalResult> {
        let mut stages = vec![Stage::ReceivedQuery];
        let top_k = match self.validate(&request) {
            Ok(k) => k,
            Err(e) => return Err(fail(&stages, e)),
        };
        info!(top_k, "received query");

        let mut query = self.intent.extract(&request.query).await;
        stages.push(Stage::IntentExtracted);
        debug!(place = ?query.place_name, semantic = %query.semantic_text, "intent extracted");

        let snapshot = self.index.snapshot();
        let pool = top_k.max(self.candidate_pool);
        let (spatial, semantic) = tokio::join!(
            self.spatial_branch(&*snapshot, query.place_name.as_deref()),
            self.ranker.rank(&*snapshot, &query.semantic_text, pool),
        );

        let mut degradations = Degradations::default();
        let (spatial_matches, spatial_available) = match spatial {
            SpatialBranch::Applied { extent, outcome } => {
                stages.push(Stage::SpatiallyFiltered);
                degradations.spatial_full_scan = outcome.full_scan;
                info!(matches = outcome.matches.len(), full_scan = outcome.full_scan, "spatially filtered");
                query = query.with_extent(extent);
                (outcome.matches, true)
            }
            SpatialBranch::Skipped(reason) => {
                stages.push(Stage::SpatialSkipped);
                if reason != SpatialSkip::NoPlaceName {
                    warn!(?reason, "spatial filtering skipped; ranking semantically only");
                }
                degradations.spatial = Some(reason);
                (Default::default(), false)
            }
        };

        let semantic = match semantic {
            Ok(hits) => hits,
            Err(e) if matches!(e.kind(), ErrorKind::EmbeddingUnavailable | ErrorKind::IndexUnavailable) => {
                if !spatial_available {
                    let err = Error::IndexUnavailable(format!("semantic ranking failed ({e}) and no spatial filter applies"));
                    return Err(fail(&stages, err));
                }
                warn!(error = %e, "semantic ranking skipped; ranking spatially only");
                degradations.semantic_skipped = true;
                Vec::new()
            }
            Err(e) => return Err(fail(&stages, e)),
        };
        stages.push(Stage::SemanticallyRanked);

        let candidates = self.merger.merge(&spatial_matches, &semantic, spatial_available, top_k);
        stages.push(Stage::Merged);
        info!(candidates = candidates.len(), "merged");

        let ids: Vec<DatasetId> = candidates.iter().map(|c| c.dataset_id.clone()).collect();
        let mut records = match snapshot.lookup_by_ids(&ids).await {
            Ok(r) => r,
            Err(e) => {
                let err = match e {
                    Error::IndexUnavailable(_) => e,
                    other => Error::IndexUnavailable(other.to_string()),
                };
                return Err(fail(&stages, err));
            }
        };
        let datasets: Vec<RankedDataset> = candidates
            .into_iter()
            .filter_map(|candidate| match records.remove(&candidate.dataset_id) {
                Some(record) => Some(RankedDataset { candidate, record }),
                None => {
                    warn!(id = %candidate.dataset_id, "ranked dataset missing from index snapshot");
                    degradations.missing_records += 1;
                    None
                }
            })
            .collect();

        let answer = self.answer(&query, &datasets, &mut degradations).await;
        if answer.is_some() {
            stages.push(Stage::Synthesized);
        }
        stages.push(Stage::Done);
        info!(results = datasets.len(), clean = degradations.is_clean(), "query done");

        Ok(RetrievalResult { query, datasets, answer, degradations, stages })
    }

    fn validate(&self, request: &RetrievalRequest) -> Result<usize> {
        if request.query.trim().is_empty() {
            return Err(Error::invalid("query text is empty"));
        }
        let top_k = request.top_k.unwrap_or(self.default_top_k);
        if top_k == 0 || top_k > self.max_top_k {
            return Err(Error::invalid(format!("top_k must be in 1..={}, got {top_k}", self.max_top_k)));
        }
        Ok(top_k)
    }

    async fn spatial_branch(&self, index: &dyn DatasetIndex, place_name: Option<&str>) -> SpatialBranch {
        let Some(place) = place_name else { return SpatialBranch::Skipped(SpatialSkip::NoPlaceName) };
        let extent = match self.geocoder.resolve(place).await {
            Ok(Some(extent)) => extent,
            Ok(None) => return SpatialBranch::Skipped(SpatialSkip::PlaceNotFound),
            Err(e) if e.kind() == ErrorKind::InvalidArgument => return SpatialBranch::Skipped(SpatialSkip::NoPlaceName),
            Err(_) => return SpatialBranch::Skipped(SpatialSkip::GeocoderUnavailable),
        };
        match self.spatial.filter(index, &extent, self.relation).await {
            Ok(outcome) => SpatialBranch::Applied { extent, outcome },
            Err(e) => {
                warn!(error = %e, "spatial filter failed");
                SpatialBranch::Skipped(SpatialSkip::IndexUnavailable)
            }
        }
    }

    async fn answer(&self, query: &Query, datasets: &[RankedDataset], degradations: &mut Degradations) -> Option<String> {
        if datasets.is_empty() {
            return Some(NO_MATCHES_MESSAGE.to_string());
        }
        let synthesizer = self.synthesizer.as_ref()?;
        let records: Vec<_> = datasets.iter().map(|d| d.record.clone()).collect();
        match synthesizer.synthesize(query, &records).await {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(error = %e, "answer synthesis skipped; returning ranked list only");
                degradations.prose_skipped = true;
                None
            }
        }
    }
}

fn fail(stages: &[Stage], err: Error) -> Error {
    warn!(stage = ?Stage::Failed, after = ?stages.last(), error = %err, "query failed");
    err
}
