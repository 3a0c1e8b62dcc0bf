mod common;

use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

use common::*;
use geoseek_core::config::{GazetteerEntry, GeocoderBackend, Settings};
use geoseek_core::{IndexHandle, RetrievalRequest};
use geoseek_hybrid::setup::{build_orchestrator, open_index};

fn settings() -> Settings {
    let mut settings = Settings::default();
    settings.index.records_dir = "records".into();
    settings.embedding.dim = 3;
    settings.geocoder.backend = GeocoderBackend::Gazetteer;
    settings.geocoder.gazetteer = vec![GazetteerEntry {
        name: "Berlin".into(),
        west: BERLIN.0,
        south: BERLIN.1,
        east: BERLIN.2,
        north: BERLIN.3,
        confidence: 1.0,
    }];
    settings
}

#[tokio::test]
async fn memory_backend_answers_from_record_files() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("records");
    fs::create_dir_all(&dir).unwrap();
    let lines: Vec<String> = berlin_catalog().iter().map(|r| serde_json::to_string(r).unwrap()).collect();
    fs::write(dir.join("catalog.jsonl"), lines.join("\n")).unwrap();

    let settings = settings();
    let index = open_index(&settings, tmp.path()).await.unwrap();
    assert_eq!(index.len(), 3);

    let orchestrator = build_orchestrator(&settings, Arc::new(IndexHandle::new(index)), Arc::new(ScriptedEmbedder::parks())).unwrap();
    let result = orchestrator.retrieve(RetrievalRequest::new("parks near Berlin")).await.unwrap();
    let ids: Vec<&str> = result.dataset_ids().into_iter().map(|id| id.as_str()).collect();
    assert_eq!(ids, vec!["ds-45", "ds-12"]);
    assert!(result.answer.is_none(), "llm disabled by default");
}

#[tokio::test]
async fn missing_records_dir_opens_empty_index() {
    let tmp = TempDir::new().unwrap();
    let index = open_index(&settings(), tmp.path()).await.unwrap();
    assert!(index.is_empty());
}

#[test]
fn bad_alpha_is_rejected_when_building() {
    let mut settings = settings();
    settings.retrieval.alpha = 2.0;
    let index = Arc::new(IndexHandle::new(Arc::new(geoseek_hybrid::SnapshotIndex::build(Vec::new()))));
    assert!(build_orchestrator(&settings, index, Arc::new(ScriptedEmbedder::parks())).is_err());
}
