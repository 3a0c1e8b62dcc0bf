#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use geoseek_core::config::RetrievalSettings;
use geoseek_core::geo::{BoundingBox, Extent, Geometry};
use geoseek_core::traits::{ContextBlock, EmbeddingProvider, GenerationProvider, GeocodeMatch, Geocoder};
use geoseek_core::{DatasetId, DatasetRecord, Error, IndexHandle, Result};
use geoseek_hybrid::{AnswerSynthesizer, Components, Gazetteer, GeocoderAdapter, IntentExtractor, Orchestrator, SnapshotIndex};
use geoseek_vector::SemanticRanker;

pub const BERLIN: (f64, f64, f64, f64) = (13.08, 52.33, 13.76, 52.67);

pub fn bbox((a, b, c, d): (f64, f64, f64, f64)) -> BoundingBox {
    BoundingBox::new(a, b, c, d).unwrap()
}

pub fn record(id: &str, title: &str, footprint: Option<(f64, f64, f64, f64)>, embedding: Option<Vec<f32>>) -> DatasetRecord {
    DatasetRecord {
        id: DatasetId::from(id),
        title: title.to_string(),
        description: format!("Description of {title}"),
        keywords: Vec::new(),
        publisher: None,
        metadata: Default::default(),
        geometry: footprint.map(|f| Geometry::BoundingBox(bbox(f))),
        embedding,
    }
}

/// ds-12 covers Berlin without an embedding, ds-45 sits inside Berlin with
/// similarity 0.9 to "parks", ds-99 is in Paris with similarity 0.7.
pub fn berlin_catalog() -> Vec<DatasetRecord> {
    vec![
        record("ds-12", "Berlin district boundaries", Some((13.0, 52.0, 14.0, 53.0)), None),
        record("ds-45", "Berlin public parks", Some((13.2, 52.4, 13.5, 52.6)), Some(vec![0.9, (1.0f32 - 0.81).sqrt(), 0.0])),
        record("ds-99", "Paris parks", Some((2.2, 48.8, 2.5, 48.9)), Some(vec![0.7, 0.0, (1.0f32 - 0.49).sqrt()])),
    ]
}

pub fn gazetteer() -> Arc<dyn Geocoder> {
    let mut g = Gazetteer::default();
    g.insert("Berlin", Extent::single(bbox(BERLIN)), 1.0);
    Arc::new(g)
}

pub enum Mode {
    Ok,
    Fail,
    Hang,
}

/// Embeds known texts to fixed vectors, everything else to `[0, 0, 1]`.
pub struct ScriptedEmbedder {
    pub vectors: HashMap<String, Vec<f32>>,
    pub mode: Mode,
    pub calls: AtomicUsize,
}

impl ScriptedEmbedder {
    pub fn parks() -> Self {
        Self::with_mode(Mode::Ok)
    }

    pub fn with_mode(mode: Mode) -> Self {
        let vectors = [("parks".to_string(), vec![1.0, 0.0, 0.0])].into_iter().collect();
        Self { vectors, mode, calls: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl EmbeddingProvider for ScriptedEmbedder {
    fn provider_id(&self) -> &str { "scripted" }
    fn dim(&self) -> usize { 3 }
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            Mode::Ok => Ok(self.vectors.get(text).cloned().unwrap_or_else(|| vec![0.0, 0.0, 1.0])),
            Mode::Fail => Err(Error::EmbeddingUnavailable("embedding service down".into())),
            Mode::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(vec![0.0; 3])
            }
        }
    }
}

pub struct CountingGeocoder {
    pub inner: Arc<dyn Geocoder>,
    pub mode: Mode,
    pub calls: AtomicUsize,
}

impl CountingGeocoder {
    pub fn new(mode: Mode) -> Self {
        Self { inner: gazetteer(), mode, calls: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl Geocoder for CountingGeocoder {
    fn name(&self) -> &str { "counting" }
    async fn geocode(&self, place_name: &str) -> Result<Vec<GeocodeMatch>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            Mode::Ok => self.inner.geocode(place_name).await,
            Mode::Fail => Err(Error::GeocodeUnavailable("geocoder unreachable".into())),
            Mode::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(Vec::new())
            }
        }
    }
}

/// Records the context it was given; fails when `fail` is set.
#[derive(Default)]
pub struct RecordingGenerator {
    pub fail: bool,
    pub calls: AtomicUsize,
    pub seen: Mutex<Vec<Vec<ContextBlock>>>,
}

#[async_trait]
impl GenerationProvider for RecordingGenerator {
    fn name(&self) -> &str { "recording" }
    async fn generate(&self, context: &[ContextBlock], instructions: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(context.to_vec());
        }
        if self.fail {
            return Err(Error::SynthesisUnavailable("model overloaded".into()));
        }
        assert!(instructions.contains("square brackets"));
        let ids: Vec<String> = context.iter().map(|b| format!("[{}]", b.dataset_id)).collect();
        Ok(format!("Relevant datasets: {}", ids.join(", ")))
    }
}

pub struct Harness {
    pub index: Arc<IndexHandle>,
    pub embedder: Arc<ScriptedEmbedder>,
    pub geocoder: Arc<CountingGeocoder>,
    pub generator: Option<Arc<RecordingGenerator>>,
}

impl Harness {
    pub fn new(index: SnapshotIndex) -> Self {
        Self {
            index: Arc::new(IndexHandle::new(Arc::new(index))),
            embedder: Arc::new(ScriptedEmbedder::parks()),
            geocoder: Arc::new(CountingGeocoder::new(Mode::Ok)),
            generator: None,
        }
    }

    pub fn berlin() -> Self {
        Self::new(SnapshotIndex::build(berlin_catalog()))
    }

    pub fn with_embedder(mut self, mode: Mode) -> Self {
        self.embedder = Arc::new(ScriptedEmbedder::with_mode(mode));
        self
    }

    pub fn with_geocoder(mut self, mode: Mode) -> Self {
        self.geocoder = Arc::new(CountingGeocoder::new(mode));
        self
    }

    pub fn with_generator(mut self, generator: RecordingGenerator) -> Self {
        self.generator = Some(Arc::new(generator));
        self
    }

    pub fn orchestrator(&self) -> Orchestrator {
        let timeout = Duration::from_millis(200);
        let components = Components {
            intent: IntentExtractor::rule_based(),
            geocoder: GeocoderAdapter::new(self.geocoder.clone(), timeout, 64),
            ranker: SemanticRanker::new(self.embedder.clone(), timeout),
            synthesizer: self
                .generator
                .clone()
                .map(|g| AnswerSynthesizer::new(g as Arc<dyn GenerationProvider>, timeout)),
        };
        Orchestrator::new(self.index.clone(), components, &RetrievalSettings::default()).unwrap()
    }
}
