//! Loader for harvested catalog snapshots on disk.
//!
//! The harvesting pipeline writes dataset records as `*.json` (one record or
//! an array) or `*.jsonl` (one record per line). This module walks a
//! directory, parses every file in path order and enforces the record
//! invariants before anything is indexed.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::types::{DatasetId, DatasetRecord};

#[derive(Debug, Clone, Default)]
pub struct CatalogLoader {
    limit: Option<usize>,
    expected_dim: Option<usize>,
}

/// Records plus a count of what was rejected on the way in.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub records: Vec<DatasetRecord>,
    pub skipped: usize,
}

impl CatalogLoader {
    pub fn new() -> Self { Self::default() }

    /// Stop after this many files.
    pub fn with_file_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Drop embeddings whose length differs from `dim`.
    pub fn with_embedding_dim(mut self, dim: usize) -> Self {
        self.expected_dim = Some(dim);
        self
    }

    pub fn load_dir(&self, dir: &Path) -> Result<Catalog> {
        let mut files = list_record_files(dir);
        if files.is_empty() {
            warn!(dir = %dir.display(), "no record files found");
            return Ok(Catalog::default());
        }
        if let Some(limit) = self.limit {
            files.truncate(limit);
        }
        let mut by_id: BTreeMap<DatasetId, DatasetRecord> = BTreeMap::new();
        let mut skipped = 0usize;
        for path in &files {
            let content = read_file_content(path)?;
            let parsed = parse_records(path, &content);
            skipped += parsed.skipped;
            for record in parsed.records {
                match self.admit(record) {
                    Some(record) => {
                        if by_id.contains_key(&record.id) {
                            warn!(id = %record.id, file = %path.display(), "duplicate dataset id; keeping first occurrence");
                            skipped += 1;
                            continue;
                        }
                        by_id.insert(record.id.clone(), record);
                    }
                    None => skipped += 1,
                }
            }
        }
        info!(files = files.len(), records = by_id.len(), skipped, "loaded catalog");
        Ok(Catalog { records: by_id.into_values().collect(), skipped })
    }

    fn admit(&self, mut record: DatasetRecord) -> Option<DatasetRecord> {
        if record.id.as_str().trim().is_empty() {
            warn!(title = %record.title, "record without identifier");
            return None;
        }
        if let Some(geometry) = &record.geometry {
            let env = geometry.envelope();
            if env.width() <= 0.0 && env.height() <= 0.0 {
                warn!(id = %record.id, envelope = %env, "degenerate footprint; record skipped");
                return None;
            }
        }
        if let Some(embedding) = &record.embedding {
            let bad_dim = self.expected_dim.is_some_and(|d| d != embedding.len());
            if embedding.is_empty() || bad_dim || embedding.iter().any(|v| !v.is_finite()) {
                warn!(id = %record.id, len = embedding.len(), "unusable embedding dropped");
                record.embedding = None;
            }
        }
        Some(record)
    }
}

struct Parsed {
    records: Vec<DatasetRecord>,
    skipped: usize,
}

fn parse_records(path: &Path, content: &str) -> Parsed {
    let mut records = Vec::new();
    let mut skipped = 0usize;
    if path.extension().and_then(|s| s.to_str()) == Some("jsonl") {
        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() { continue; }
            match serde_json::from_str::<DatasetRecord>(line) {
                Ok(r) => records.push(r),
                Err(e) => {
                    warn!(file = %path.display(), line = line_no + 1, error = %e, "invalid record");
                    skipped += 1;
                }
            }
        }
        return Parsed { records, skipped };
    }
    match serde_json::from_str::<serde_json::Value>(content) {
        Ok(serde_json::Value::Array(items)) => {
            for item in items {
                match serde_json::from_value::<DatasetRecord>(item) {
                    Ok(r) => records.push(r),
                    Err(e) => {
                        warn!(file = %path.display(), error = %e, "invalid record");
                        skipped += 1;
                    }
                }
            }
        }
        Ok(value) => match serde_json::from_value::<DatasetRecord>(value) {
            Ok(r) => records.push(r),
            Err(e) => {
                warn!(file = %path.display(), error = %e, "invalid record");
                skipped += 1;
            }
        },
        Err(e) => {
            warn!(file = %path.display(), error = %e, "unparseable record file");
            skipped += 1;
        }
    }
    Parsed { records, skipped }
}

fn read_file_content(file_path: &Path) -> Result<String> {
    match fs::read_to_string(file_path) {
        Ok(content) => Ok(content),
        Err(_) => {
            let bytes = fs::read(file_path).with_context(|| format!("reading {}", file_path.display()))?;
            Ok(String::from_utf8_lossy(&bytes).to_string())
        }
    }
}

fn list_record_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
        let path = entry.path();
        if matches!(path.extension().and_then(|s| s.to_str()), Some("json") | Some("jsonl")) {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    files
}
