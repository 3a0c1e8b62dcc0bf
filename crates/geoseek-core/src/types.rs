//! Domain types shared by the retrieval components.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::geo::{Extent, Geometry};

/// Stable dataset identifier. Ordering is plain string ordering and is the
/// tie-break used by every ranking stage.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetId(String);

impl DatasetId {
    pub fn new(id: impl Into<String>) -> Self { Self(id.into()) }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl From<&str> for DatasetId {
    fn from(s: &str) -> Self { Self(s.to_string()) }
}

impl From<String> for DatasetId {
    fn from(s: String) -> Self { Self(s) }
}

/// A harvested metadata record.
///
/// Produced by the harvesting pipeline and read-only here. `embedding` is
/// absent for records that were never embedded; those are skipped by
/// semantic ranking but still take part in spatial filtering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetRecord {
    pub id: DatasetId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub geometry: Option<Geometry>,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

/// A parsed user query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub raw_text: String,
    pub place_name: Option<String>,
    pub semantic_text: String,
    #[serde(default)]
    pub themes: Vec<String>,
    #[serde(default)]
    pub publishers: Vec<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub extent: Option<Extent>,
}

impl Query {
    /// Query without spatial intent: the whole text is the semantic query.
    pub fn semantic_only(raw_text: impl Into<String>) -> Self {
        let raw_text = raw_text.into();
        Self {
            semantic_text: raw_text.clone(),
            raw_text,
            place_name: None,
            themes: Vec::new(),
            publishers: Vec::new(),
            language: None,
            extent: None,
        }
    }

    pub fn with_extent(mut self, extent: Extent) -> Self {
        self.extent = Some(extent);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub dataset_id: DatasetId,
    pub spatial_score: f32,
    pub semantic_score: f32,
    pub combined_score: f32,
}

/// A ranked candidate joined with its metadata record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedDataset {
    pub candidate: ScoredCandidate,
    pub record: DatasetRecord,
}

/// Caller-facing request: raw text plus an optional top-K override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalRequest {
    pub query: String,
    #[serde(default)]
    pub top_k: Option<usize>,
}

impl RetrievalRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self { query: query.into(), top_k: None }
    }

    pub fn with_top_k(mut self, k: usize) -> Self {
        self.top_k = Some(k);
        self
    }
}

/// Why spatial filtering did not constrain the ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpatialSkip {
    NoPlaceName,
    PlaceNotFound,
    GeocoderUnavailable,
    IndexUnavailable,
}

/// Everything that went less than perfectly while answering a query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Degradations {
    pub spatial: Option<SpatialSkip>,
    /// The spatial index was unavailable and a full scan was used instead.
    pub spatial_full_scan: bool,
    pub semantic_skipped: bool,
    pub prose_skipped: bool,
    /// Ranked ids whose record was absent from the index snapshot.
    #[serde(default)]
    pub missing_records: usize,
}

impl Degradations {
    pub fn spatial_skipped(&self) -> bool { self.spatial.is_some() }

    pub fn is_clean(&self) -> bool {
        !self.spatial_full_scan
            && !self.semantic_skipped
            && !self.prose_skipped
            && self.missing_records == 0
            && matches!(self.spatial, None | Some(SpatialSkip::NoPlaceName))
    }
}

/// Orchestrator state machine positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    ReceivedQuery,
    IntentExtracted,
    SpatiallyFiltered,
    SpatialSkipped,
    SemanticallyRanked,
    Merged,
    Synthesized,
    Done,
    Failed,
}

impl Stage {
    pub fn is_terminal(self) -> bool { matches!(self, Stage::Done | Stage::Failed) }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub query: Query,
    pub datasets: Vec<RankedDataset>,
    /// Grounded prose answer; `None` when synthesis was skipped.
    pub answer: Option<String>,
    pub degradations: Degradations,
    pub stages: Vec<Stage>,
}

impl RetrievalResult {
    pub fn dataset_ids(&self) -> Vec<&DatasetId> {
        self.datasets.iter().map(|d| &d.candidate.dataset_id).collect()
    }
}
