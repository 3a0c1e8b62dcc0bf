use std::fs;
use tempfile::TempDir;

use geoseek_core::catalog::CatalogLoader;
use geoseek_core::config::{Config, SpatialScoring};
use geoseek_core::{BoundingBox, ErrorKind, Geometry, SpatialRelation};

const BERLIN_PARKS: &str = r#"{
  "id": "ds-12",
  "title": "Berlin park boundaries",
  "description": "Polygons of public parks",
  "geometry": { "type": "bbox", "min_lon": 13.08, "min_lat": 52.33, "max_lon": 13.76, "max_lat": 52.67 },
  "embedding": [0.1, 0.2, 0.3]
}"#;

#[test]
fn load_dir_reads_json_and_jsonl() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::write(dir.join("a.json"), BERLIN_PARKS).unwrap();
    fs::create_dir_all(dir.join("nested")).unwrap();
    fs::write(
        dir.join("nested/b.jsonl"),
        "{\"id\":\"ds-99\",\"title\":\"Trees\"}\n\n{\"id\":\"ds-45\",\"title\":\"Green areas\"}\n",
    )
    .unwrap();
    fs::write(dir.join("notes.txt"), "ignored").unwrap();

    let catalog = CatalogLoader::new().load_dir(dir).expect("load");
    let ids: Vec<&str> = catalog.records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["ds-12", "ds-45", "ds-99"], "records come back sorted by id");
    assert_eq!(catalog.skipped, 0);
    let parks = &catalog.records[0];
    assert!(matches!(parks.geometry, Some(Geometry::BoundingBox(_))));
    assert_eq!(parks.embedding.as_ref().map(Vec::len), Some(3));
}

#[test]
fn inverted_bbox_in_record_is_rejected_not_accepted() {
    let tmp = TempDir::new().unwrap();
    let bad = r#"{"id":"ds-1","title":"Fiji","geometry":{"type":"bbox","min_lon":177.0,"min_lat":-20.0,"max_lon":-178.0,"max_lat":-15.0}}"#;
    fs::write(tmp.path().join("bad.jsonl"), format!("{bad}\n{{\"id\":\"ds-2\",\"title\":\"ok\"}}\n")).unwrap();

    let catalog = CatalogLoader::new().load_dir(tmp.path()).expect("load");
    assert_eq!(catalog.records.len(), 1);
    assert_eq!(catalog.records[0].id.as_str(), "ds-2");
    assert_eq!(catalog.skipped, 1);
}

#[test]
fn point_footprint_is_skipped_but_line_is_kept() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("point.json"),
        r#"{"id":"pt","title":"Gauge","geometry":{"type":"bbox","min_lon":13.0,"min_lat":52.0,"max_lon":13.0,"max_lat":52.0}}"#,
    )
    .unwrap();
    fs::write(
        tmp.path().join("line.json"),
        r#"{"id":"ln","title":"Meridian strip","geometry":{"type":"bbox","min_lon":13.0,"min_lat":52.0,"max_lon":13.0,"max_lat":53.0}}"#,
    )
    .unwrap();

    let catalog = CatalogLoader::new().load_dir(tmp.path()).expect("load");
    let ids: Vec<&str> = catalog.records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["ln"]);
    assert_eq!(catalog.skipped, 1);
}

#[test]
fn duplicate_ids_keep_first_and_wrong_dims_drop_embedding() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("a.jsonl"),
        "{\"id\":\"x\",\"title\":\"first\",\"embedding\":[1.0,0.0]}\n{\"id\":\"x\",\"title\":\"second\"}\n{\"id\":\"y\",\"title\":\"short\",\"embedding\":[1.0]}\n",
    )
    .unwrap();

    let catalog = CatalogLoader::new().with_embedding_dim(2).load_dir(tmp.path()).expect("load");
    assert_eq!(catalog.records.len(), 2);
    assert_eq!(catalog.records[0].title, "first");
    assert!(catalog.records[1].embedding.is_none(), "mismatched dimension is dropped");
    assert_eq!(catalog.skipped, 1);
}

#[test]
fn file_limit_caps_number_of_files() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("a.json"), r#"{"id":"a","title":"a"}"#).unwrap();
    fs::write(tmp.path().join("b.json"), r#"{"id":"b","title":"b"}"#).unwrap();

    let catalog = CatalogLoader::new().with_file_limit(1).load_dir(tmp.path()).expect("load");
    assert_eq!(catalog.records.len(), 1, "limited to one source file");
}

#[test]
fn config_file_overrides_defaults() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("config.toml");
    fs::write(
        &path,
        "[retrieval]\nalpha = 0.7\nspatial_scoring = \"overlap_ratio\"\nrelation = \"within\"\n\n[[geocoder.gazetteer]]\nname = \"Berlin\"\nwest = 13.08\nsouth = 52.33\neast = 13.76\nnorth = 52.67\n",
    )
    .unwrap();

    let config = Config::load_from(&path).expect("config");
    let settings = config.settings().expect("settings");
    assert!((settings.retrieval.alpha - 0.7).abs() < f32::EPSILON);
    assert_eq!(settings.retrieval.spatial_scoring, SpatialScoring::OverlapRatio);
    assert_eq!(settings.retrieval.relation, SpatialRelation::Within);
    assert_eq!(settings.retrieval.default_top_k, 5, "untouched keys keep defaults");
    assert_eq!(settings.geocoder.gazetteer.len(), 1);
    assert!((settings.geocoder.gazetteer[0].confidence - 1.0).abs() < f64::EPSILON);
    let alpha: f32 = config.get("retrieval.alpha").expect("raw key");
    assert!((alpha - 0.7).abs() < f32::EPSILON);
}

#[test]
fn config_rejects_alpha_out_of_range() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("config.toml");
    fs::write(&path, "[retrieval]\nalpha = 1.5\n").unwrap();
    assert!(Config::load_from(&path).is_err());
}

#[test]
fn bbox_errors_are_invalid_argument() {
    let err = BoundingBox::new(10.0, 60.0, 20.0, 50.0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    let err = BoundingBox::new(f64::NAN, 0.0, 1.0, 1.0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}
