//! LanceDB-backed [`DatasetIndex`].
//!
//! Spatial queries prefilter on the envelope columns in SQL and refine the
//! survivors against the stored geometry; vector queries use Lance's cosine
//! search restricted to rows that carry a vector.

use arrow_array::cast::AsArray;
use arrow_array::{Array, FixedSizeListArray, Float32Array, RecordBatch, StringArray};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{connect, DistanceType, Table};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use tracing::{debug, warn};

use geoseek_core::geo::{BoundingBox, Extent, Geometry, SpatialRelation};
use geoseek_core::traits::DatasetIndex;
use geoseek_core::{DatasetId, DatasetRecord, Error, Result};

use crate::schema::{self, vector_dim, ENVELOPE_COLUMNS};

pub struct LanceDatasetIndex {
    table: Table,
    rows: usize,
    dim: Option<usize>,
    spatial_indexed: bool,
}

fn unavailable(e: impl std::fmt::Display) -> Error {
    Error::IndexUnavailable(e.to_string())
}

impl LanceDatasetIndex {
    pub async fn open(db_path: &Path, table_name: &str) -> Result<Self> {
        let db = connect(db_path.to_string_lossy().as_ref()).execute().await.map_err(unavailable)?;
        let table = db.open_table(table_name).execute().await.map_err(unavailable)?;
        let rows = table.count_rows(None).await.map_err(unavailable)?;
        let schema = table.schema().await.map_err(unavailable)?;
        let dim = vector_dim(&schema);
        let indices = table.list_indices().await.map_err(unavailable)?;
        let spatial_indexed = ENVELOPE_COLUMNS
            .iter()
            .all(|col| indices.iter().any(|idx| idx.columns.iter().any(|c| c == col)));
        if !spatial_indexed {
            warn!(table = table_name, "envelope columns are not indexed; spatial queries will fall back to a full scan");
        }
        debug!(table = table_name, rows, ?dim, spatial_indexed, "opened LanceDB dataset table");
        Ok(Self { table, rows, dim, spatial_indexed })
    }

    pub fn dim(&self) -> Option<usize> { self.dim }

    pub fn has_spatial_index(&self) -> bool { self.spatial_indexed }

    async fn collect(&self, filter: &str, columns: Option<&[&str]>) -> Result<Vec<RecordBatch>> {
        let mut query = self.table.query().only_if(filter);
        if let Some(cols) = columns {
            query = query.select(Select::columns(cols));
        }
        let stream = query.execute().await.map_err(unavailable)?;
        stream.try_collect().await.map_err(unavailable)
    }
}

#[async_trait]
impl DatasetIndex for LanceDatasetIndex {
    async fn lookup_by_ids(&self, ids: &[DatasetId]) -> Result<HashMap<DatasetId, DatasetRecord>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let list = ids.iter().map(|id| sql_quote(id.as_str())).collect::<Vec<_>>().join(", ");
        let batches = self.collect(&format!("{} IN ({list})", schema::ID), None).await?;
        let mut out = HashMap::with_capacity(ids.len());
        for batch in &batches {
            for record in decode_records(batch)? {
                out.insert(record.id.clone(), record);
            }
        }
        Ok(out)
    }

    async fn spatial_query(&self, extent: &Extent, relation: SpatialRelation) -> Result<BTreeSet<DatasetId>> {
        if !self.spatial_indexed {
            return Err(Error::IndexUnavailable("envelope columns have no BTree index".into()));
        }
        let filter = envelope_filter(extent, relation);
        let batches = self.collect(&filter, Some(&[schema::ID, schema::GEOMETRY])).await?;
        let mut out = BTreeSet::new();
        for batch in &batches {
            for (id, geometry) in decode_footprints(batch)? {
                if geometry.relates(relation, extent) {
                    out.insert(id);
                }
            }
        }
        debug!(%relation, matches = out.len(), "lance spatial query");
        Ok(out)
    }

    async fn vector_query(&self, embedding: &[f32], k: usize) -> Result<Vec<(DatasetId, f32)>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        if let Some(dim) = self.dim {
            if embedding.len() != dim {
                return Err(Error::EmbeddingUnavailable(format!(
                    "query embedding has {} dims, table holds {dim}",
                    embedding.len()
                )));
            }
        }
        let stream = self
            .table
            .vector_search(embedding.to_vec())
            .map_err(unavailable)?
            .distance_type(DistanceType::Cosine)
            .only_if(format!("{} IS NOT NULL", schema::VECTOR))
            .limit(k)
            .execute()
            .await
            .map_err(unavailable)?;
        let batches: Vec<RecordBatch> = stream.try_collect().await.map_err(unavailable)?;
        let mut hits = Vec::new();
        for batch in &batches {
            let ids = string_column(batch, schema::ID)?;
            let distances = batch
                .column_by_name("_distance")
                .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
                .ok_or_else(|| unavailable("_distance column missing from vector search"))?;
            for i in 0..batch.num_rows() {
                hits.push((DatasetId::new(ids.value(i)), 1.0 - distances.value(i)));
            }
        }
        Ok(hits)
    }

    async fn footprints(&self) -> Result<Vec<(DatasetId, Geometry)>> {
        let batches = self
            .collect(&format!("{} IS NOT NULL", schema::GEOMETRY), Some(&[schema::ID, schema::GEOMETRY]))
            .await?;
        let mut out = Vec::new();
        for batch in &batches {
            out.extend(decode_footprints(batch)?);
        }
        Ok(out)
    }

    fn len(&self) -> usize { self.rows }
}

fn sql_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// SQL envelope prefilter. Conservative: every row that can satisfy the exact
/// relation passes.
fn envelope_filter(extent: &Extent, relation: SpatialRelation) -> String {
    let overlaps = |b: &BoundingBox| {
        format!(
            "({MIN_LON} <= {} AND {MAX_LON} >= {} AND {MIN_LAT} <= {} AND {MAX_LAT} >= {})",
            b.max_lon(),
            b.min_lon(),
            b.max_lat(),
            b.min_lat(),
            MIN_LON = schema::MIN_LON,
            MAX_LON = schema::MAX_LON,
            MIN_LAT = schema::MIN_LAT,
            MAX_LAT = schema::MAX_LAT,
        )
    };
    let covers = |b: &BoundingBox| {
        format!(
            "({MIN_LON} <= {} AND {MAX_LON} >= {} AND {MIN_LAT} <= {} AND {MAX_LAT} >= {})",
            b.min_lon(),
            b.max_lon(),
            b.min_lat(),
            b.max_lat(),
            MIN_LON = schema::MIN_LON,
            MAX_LON = schema::MAX_LON,
            MIN_LAT = schema::MIN_LAT,
            MAX_LAT = schema::MAX_LAT,
        )
    };
    let parts = extent.parts();
    match relation {
        SpatialRelation::Intersects | SpatialRelation::Within => {
            parts.iter().map(overlaps).collect::<Vec<_>>().join(" OR ")
        }
        SpatialRelation::Contains => parts.iter().map(covers).collect::<Vec<_>>().join(" AND "),
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| unavailable(format!("{name} column missing")))
}

fn optional_string(col: &StringArray, i: usize) -> Option<String> {
    if col.is_null(i) { None } else { Some(col.value(i).to_string()) }
}

fn decode_geometry(raw: &str) -> Result<Geometry> {
    serde_json::from_str(raw).map_err(|e| unavailable(format!("stored geometry is invalid: {e}")))
}

fn decode_footprints(batch: &RecordBatch) -> Result<Vec<(DatasetId, Geometry)>> {
    let ids = string_column(batch, schema::ID)?;
    let geometries = string_column(batch, schema::GEOMETRY)?;
    let mut out = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        if let Some(raw) = optional_string(geometries, i) {
            out.push((DatasetId::new(ids.value(i)), decode_geometry(&raw)?));
        }
    }
    Ok(out)
}

fn decode_records(batch: &RecordBatch) -> Result<Vec<DatasetRecord>> {
    let ids = string_column(batch, schema::ID)?;
    let titles = string_column(batch, schema::TITLE)?;
    let descriptions = string_column(batch, schema::DESCRIPTION)?;
    let keywords = string_column(batch, schema::KEYWORDS)?;
    let publishers = string_column(batch, schema::PUBLISHER)?;
    let metadata = string_column(batch, schema::METADATA)?;
    let geometries = string_column(batch, schema::GEOMETRY)?;
    let vectors = batch.column_by_name(schema::VECTOR).and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>());

    let mut out = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        let geometry = optional_string(geometries, i).map(|raw| decode_geometry(&raw)).transpose()?;
        let embedding = vectors.filter(|v| v.is_valid(i)).map(|v| {
            v.value(i).as_primitive::<arrow_array::types::Float32Type>().values().to_vec()
        });
        out.push(DatasetRecord {
            id: DatasetId::new(ids.value(i)),
            title: titles.value(i).to_string(),
            description: descriptions.value(i).to_string(),
            keywords: serde_json::from_str(keywords.value(i)).map_err(unavailable)?,
            publisher: optional_string(publishers, i),
            metadata: serde_json::from_str(metadata.value(i)).map_err(unavailable)?,
            geometry,
            embedding,
        });
    }
    Ok(out)
}
