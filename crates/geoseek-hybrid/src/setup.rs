//! Assembles an [`Orchestrator`] and its index from [`Settings`].

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use geoseek_core::catalog::CatalogLoader;
use geoseek_core::config::{resolve_with_base, IndexBackend, Settings};
use geoseek_core::traits::{DatasetIndex, EmbeddingProvider};
use geoseek_core::IndexHandle;
use geoseek_vector::{LanceDatasetIndex, SemanticRanker};

use crate::chat::ChatClient;
use crate::geocode::{geocoder_from_settings, GeocoderAdapter};
use crate::intent::{ChatIntentModel, IntentExtractor};
use crate::orchestrator::{Components, Orchestrator};
use crate::snapshot::SnapshotIndex;
use crate::synthesize::{AnswerSynthesizer, ChatGenerator};

/// Opens the configured index backend. Relative paths resolve against `base`.
pub async fn open_index(settings: &Settings, base: &Path) -> Result<Arc<dyn DatasetIndex>> {
    let index: Arc<dyn DatasetIndex> = match settings.index.backend {
        IndexBackend::Memory => {
            let dir = resolve_with_base(base, &settings.index.records_dir);
            let catalog = CatalogLoader::new()
                .with_embedding_dim(settings.embedding.dim)
                .load_dir(&dir)
                .with_context(|| format!("loading dataset records from {}", dir.display()))?;
            Arc::new(SnapshotIndex::from_catalog(catalog))
        }
        IndexBackend::Lancedb => {
            let dir = resolve_with_base(base, &settings.index.lancedb_dir);
            Arc::new(LanceDatasetIndex::open(&dir, &settings.index.table).await?)
        }
    };
    info!(backend = ?settings.index.backend, records = index.len(), "dataset index ready");
    Ok(index)
}

pub fn build_orchestrator(settings: &Settings, index: Arc<IndexHandle>, embedder: Arc<dyn EmbeddingProvider>) -> Result<Orchestrator> {
    let t = &settings.timeouts;
    let geocoder = GeocoderAdapter::new(
        geocoder_from_settings(&settings.geocoder)?,
        Duration::from_millis(t.geocode_ms),
        settings.geocoder.cache_capacity,
    );
    let ranker = SemanticRanker::new(embedder, Duration::from_millis(t.embed_ms))
        .with_min_similarity(settings.retrieval.min_similarity);

    let (intent, synthesizer) = if settings.llm.enabled {
        let client = ChatClient::from_settings(&settings.llm)?;
        let model = ChatIntentModel::new(client.clone(), &settings.llm.intent_model, settings.llm.intent_temperature);
        let generator = ChatGenerator::new(client, &settings.llm.model, settings.llm.temperature);
        (
            IntentExtractor::with_model(Arc::new(model), Duration::from_millis(t.intent_ms)),
            Some(AnswerSynthesizer::new(Arc::new(generator), Duration::from_millis(t.generate_ms))),
        )
    } else {
        (IntentExtractor::rule_based(), None)
    };

    let components = Components { intent, geocoder, ranker, synthesizer };
    Ok(Orchestrator::new(index, components, &settings.retrieval)?)
}
