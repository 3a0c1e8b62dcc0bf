//! Bulk ingest of dataset records into LanceDB.

use anyhow::{anyhow, Result};
use arrow_array::{FixedSizeListArray, Float64Array, RecordBatch, RecordBatchIterator, StringArray};
use indicatif::{ProgressBar, ProgressStyle};
use lancedb::index::scalar::BTreeIndexBuilder;
use lancedb::index::Index;
use lancedb::{connect, Connection};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use geoseek_core::DatasetRecord;

use crate::schema::{build_dataset_schema, ENVELOPE_COLUMNS};

const BATCH_SIZE: usize = 1000;

pub struct LanceDatasetWriter {
    db: Connection,
    table_name: String,
    dim: usize,
    spatial_indexes: bool,
}

impl LanceDatasetWriter {
    pub async fn new(db_path: &Path, table_name: &str, dim: usize) -> Result<Self> {
        if dim == 0 {
            return Err(anyhow!("embedding dimension must be positive"));
        }
        let db = connect(db_path.to_string_lossy().as_ref()).execute().await?;
        Ok(Self { db, table_name: table_name.to_string(), dim, spatial_indexes: true })
    }

    /// Skip the envelope indexes after writing. Spatial queries against such
    /// a table fall back to a full footprint scan.
    pub fn with_spatial_indexes(mut self, build: bool) -> Self {
        self.spatial_indexes = build;
        self
    }

    /// Upsert records by id. Embeddings of the wrong width are stored as null.
    pub async fn write(&self, records: &[DatasetRecord]) -> Result<usize> {
        if records.is_empty() {
            info!(table = %self.table_name, "no records to ingest");
            return Ok(0);
        }
        info!(records = records.len(), table = %self.table_name, "ingesting dataset records into LanceDB");
        let pb = ProgressBar::new(records.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} records ({percent}%) {msg}")?
                .progress_chars("#>-"),
        );
        let mut written = 0usize;
        for chunk in records.chunks(BATCH_SIZE) {
            self.insert_batch(chunk).await?;
            written += chunk.len();
            pb.set_position(written as u64);
        }
        pb.finish_with_message("done");
        if self.spatial_indexes {
            self.build_spatial_indexes().await?;
        }
        info!(written, "LanceDB ingest finished");
        Ok(written)
    }

    /// (Re)builds a BTree index on each envelope column.
    pub async fn build_spatial_indexes(&self) -> Result<()> {
        let table = self.db.open_table(&self.table_name).execute().await?;
        for column in ENVELOPE_COLUMNS {
            table
                .create_index(&[column], Index::BTree(BTreeIndexBuilder::default()))
                .name(format!("{column}_idx"))
                .replace(true)
                .execute()
                .await?;
        }
        info!(table = %self.table_name, columns = ?ENVELOPE_COLUMNS, "built envelope indexes");
        Ok(())
    }

    async fn insert_batch(&self, records: &[DatasetRecord]) -> Result<()> {
        let batch = self.records_to_batch(records)?;
        let schema = batch.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
        if self.db.table_names().execute().await?.contains(&self.table_name) {
            let table = self.db.open_table(&self.table_name).execute().await?;
            let mut mi = table.merge_insert(&["id"]);
            mi.when_matched_update_all(None).when_not_matched_insert_all();
            let _ = mi.execute(reader).await?;
        } else {
            self.db.create_table(&self.table_name, reader).execute().await?;
        }
        Ok(())
    }

    fn records_to_batch(&self, records: &[DatasetRecord]) -> Result<RecordBatch> {
        let dim = i32::try_from(self.dim)?;
        let schema = build_dataset_schema(dim);
        let mut ids = Vec::with_capacity(records.len());
        let mut titles = Vec::with_capacity(records.len());
        let mut descriptions = Vec::with_capacity(records.len());
        let mut keywords = Vec::with_capacity(records.len());
        let mut publishers = Vec::with_capacity(records.len());
        let mut metadata = Vec::with_capacity(records.len());
        let mut geometries: Vec<Option<String>> = Vec::with_capacity(records.len());
        let (mut min_lon, mut min_lat, mut max_lon, mut max_lat) = (Vec::new(), Vec::new(), Vec::new(), Vec::new());
        let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(records.len());

        for r in records {
            ids.push(r.id.to_string());
            titles.push(r.title.clone());
            descriptions.push(r.description.clone());
            keywords.push(serde_json::to_string(&r.keywords)?);
            publishers.push(r.publisher.clone());
            metadata.push(serde_json::to_string(&r.metadata)?);
            match &r.geometry {
                Some(g) => {
                    let env = g.envelope();
                    geometries.push(Some(serde_json::to_string(g)?));
                    min_lon.push(Some(env.min_lon()));
                    min_lat.push(Some(env.min_lat()));
                    max_lon.push(Some(env.max_lon()));
                    max_lat.push(Some(env.max_lat()));
                }
                None => {
                    geometries.push(None);
                    min_lon.push(None);
                    min_lat.push(None);
                    max_lon.push(None);
                    max_lat.push(None);
                }
            }
            let vector = match &r.embedding {
                Some(v) if v.len() == self.dim => Some(v.iter().map(|&x| Some(x)).collect()),
                Some(v) => {
                    warn!(id = %r.id, got = v.len(), expected = self.dim, "embedding width mismatch; storing without vector");
                    None
                }
                None => None,
            };
            vectors.push(vector);
        }

        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(StringArray::from(titles)),
                Arc::new(StringArray::from(descriptions)),
                Arc::new(StringArray::from(keywords)),
                Arc::new(StringArray::from(publishers)),
                Arc::new(StringArray::from(metadata)),
                Arc::new(StringArray::from(geometries)),
                Arc::new(Float64Array::from(min_lon)),
                Arc::new(Float64Array::from(min_lat)),
                Arc::new(Float64Array::from(max_lon)),
                Arc::new(Float64Array::from(max_lat)),
                Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors, dim)),
            ],
        )?;
        Ok(batch)
    }
}
