//! Immutable in-memory [`DatasetIndex`] built from a loaded catalog.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use tracing::info;

use geoseek_core::catalog::Catalog;
use geoseek_core::geo::{Extent, Geometry, SpatialRelation};
use geoseek_core::traits::DatasetIndex;
use geoseek_core::{DatasetId, DatasetRecord, Error, Result};
use geoseek_spatial::PackedRTree;
use geoseek_vector::FlatVectorIndex;

pub struct SnapshotIndex {
    records: HashMap<DatasetId, DatasetRecord>,
    footprints: Vec<(DatasetId, Geometry)>,
    tree: Option<PackedRTree<usize>>,
    vectors: FlatVectorIndex,
}

impl SnapshotIndex {
    pub fn build(records: Vec<DatasetRecord>) -> Self {
        let mut index = Self::without_spatial_index(records);
        let entries = index.footprints.iter().enumerate().map(|(i, (_, g))| (g.envelope(), i)).collect();
        let tree = PackedRTree::bulk_load(entries);
        info!(records = index.records.len(), footprints = index.footprints.len(), vectors = index.vectors.len(), tree_height = tree.height(), "built in-memory dataset index");
        index.tree = Some(tree);
        index
    }

    /// Index whose `spatial_query` reports `IndexUnavailable`; spatial
    /// filtering then runs as a full scan over `footprints`.
    pub fn without_spatial_index(records: Vec<DatasetRecord>) -> Self {
        let vectors = FlatVectorIndex::from_records(&records);
        let mut footprints: Vec<(DatasetId, Geometry)> =
            records.iter().filter_map(|r| r.geometry.clone().map(|g| (r.id.clone(), g))).collect();
        footprints.sort_by(|a, b| a.0.cmp(&b.0));
        let records = records.into_iter().map(|r| (r.id.clone(), r)).collect();
        Self { records, footprints, tree: None, vectors }
    }

    pub fn from_catalog(catalog: Catalog) -> Self {
        Self::build(catalog.records)
    }

    pub fn vector_dim(&self) -> usize { self.vectors.dim() }
}

#[async_trait]
impl DatasetIndex for SnapshotIndex {
    async fn lookup_by_ids(&self, ids: &[DatasetId]) -> Result<HashMap<DatasetId, DatasetRecord>> {
        Ok(ids.iter().filter_map(|id| self.records.get(id).map(|r| (id.clone(), r.clone()))).collect())
    }

    async fn spatial_query(&self, extent: &Extent, relation: SpatialRelation) -> Result<BTreeSet<DatasetId>> {
        let tree = self
            .tree
            .as_ref()
            .ok_or_else(|| Error::IndexUnavailable("in-memory index was built without an R-tree".into()))?;
        Ok(tree
            .search(extent, relation)
            .into_iter()
            .map(|&i| &self.footprints[i])
            .filter(|(_, g)| g.relates(relation, extent))
            .map(|(id, _)| id.clone())
            .collect())
    }

    async fn vector_query(&self, embedding: &[f32], k: usize) -> Result<Vec<(DatasetId, f32)>> {
        self.vectors.search(embedding, k)
    }

    async fn footprints(&self) -> Result<Vec<(DatasetId, Geometry)>> {
        Ok(self.footprints.clone())
    }

    fn len(&self) -> usize { self.records.len() }
}
