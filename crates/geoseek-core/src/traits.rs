//! Capability interfaces for the external collaborators.
//!
//! Every remote or pluggable piece (geocoding, embeddings, language
//! generation, language understanding, the dataset index) is consumed through
//! one of these traits, so tests substitute fakes and deployments pick
//! adapters from configuration.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::error::Result;
use crate::geo::{BoundingBox, Extent, Geometry, SpatialRelation};
use crate::types::{DatasetId, DatasetRecord};

/// Synchronous embedder for in-process models.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Async embedding capability used by the semantic ranker.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Stable identifier for the provider/model (e.g. `local:bge-m3:d1024`).
    fn provider_id(&self) -> &str;
    fn dim(&self) -> usize;
    /// Failures map to `Error::EmbeddingUnavailable`.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// One candidate interpretation of a place name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeMatch {
    pub display_name: String,
    pub extent: Extent,
    /// Backend-specific confidence, higher is better.
    pub confidence: f64,
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    fn name(&self) -> &str;
    /// Empty result means the place is unknown. Unreachable backends return
    /// `Error::GeocodeUnavailable`.
    async fn geocode(&self, place_name: &str) -> Result<Vec<GeocodeMatch>>;
}

/// One retrieved dataset rendered for the generation prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextBlock {
    pub dataset_id: DatasetId,
    pub title: String,
    pub snippet: String,
}

#[async_trait]
pub trait GenerationProvider: Send + Sync {
    fn name(&self) -> &str;
    async fn generate(&self, context: &[ContextBlock], instructions: &str) -> Result<String>;
}

/// Structured reading of a free-text query produced by a language model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedIntent {
    #[serde(default)]
    pub raw_theme: String,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub themes: Vec<String>,
    #[serde(default)]
    pub publishers: Vec<String>,
    #[serde(default)]
    pub language: Option<String>,
}

#[async_trait]
pub trait IntentModel: Send + Sync {
    fn name(&self) -> &str;
    async fn parse(&self, raw_text: &str) -> anyhow::Result<ParsedIntent>;
}

/// Read access to one consistent snapshot of the dataset catalog.
///
/// Implementations are immutable for the lifetime of the `Arc` handed out by
/// [`crate::index::IndexHandle::snapshot`]; failures surface as
/// `Error::IndexUnavailable`.
#[async_trait]
pub trait DatasetIndex: Send + Sync {
    async fn lookup_by_ids(&self, ids: &[DatasetId]) -> Result<HashMap<DatasetId, DatasetRecord>>;

    /// Ids whose footprint satisfies `relation` against `extent`, using the
    /// spatial index.
    async fn spatial_query(&self, extent: &Extent, relation: SpatialRelation) -> Result<BTreeSet<DatasetId>>;

    /// `(id, cosine similarity)` pairs, best first, at most `k`.
    async fn vector_query(&self, embedding: &[f32], k: usize) -> Result<Vec<(DatasetId, f32)>>;

    /// Every footprint in the snapshot; used for the full-scan fallback.
    async fn footprints(&self) -> Result<Vec<(DatasetId, Geometry)>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool { self.len() == 0 }
}

/// Envelope pre-check shared by index implementations.
pub fn envelope_may_relate(envelope: &BoundingBox, extent: &Extent, relation: SpatialRelation) -> bool {
    match relation {
        SpatialRelation::Intersects | SpatialRelation::Within => extent.parts().iter().any(|b| envelope.intersects(b)),
        SpatialRelation::Contains => extent.parts().iter().all(|b| envelope.contains_box(b)),
    }
}
