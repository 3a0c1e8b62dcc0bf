use std::cmp::Ordering;

use geoseek_core::{DatasetId, DatasetRecord, Error, Result};

/// Exact cosine search over L2-normalised record embeddings.
///
/// Records without an embedding are not indexed. The first indexed vector
/// fixes the dimensionality; later vectors of another length are skipped.
#[derive(Debug, Clone, Default)]
pub struct FlatVectorIndex {
    ids: Vec<DatasetId>,
    vectors: Vec<Vec<f32>>,
    dim: usize,
}

impl FlatVectorIndex {
    pub fn from_records(records: &[DatasetRecord]) -> Self {
        let mut index = Self::default();
        for r in records {
            if let Some(v) = &r.embedding {
                index.insert(r.id.clone(), v);
            }
        }
        index
    }

    fn insert(&mut self, id: DatasetId, v: &[f32]) {
        if v.is_empty() || (self.dim != 0 && v.len() != self.dim) {
            return;
        }
        let Some(unit) = normalize(v) else { return };
        self.dim = v.len();
        self.ids.push(id);
        self.vectors.push(unit);
    }

    pub fn len(&self) -> usize { self.ids.len() }

    pub fn is_empty(&self) -> bool { self.ids.is_empty() }

    pub fn dim(&self) -> usize { self.dim }

    /// Top `k` by cosine similarity, best first, id ascending on ties.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(DatasetId, f32)>> {
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }
        if query.len() != self.dim {
            return Err(Error::EmbeddingUnavailable(format!(
                "query embedding has {} dims, index holds {}",
                query.len(),
                self.dim
            )));
        }
        let Some(q) = normalize(query) else { return Ok(Vec::new()) };
        let mut scored: Vec<(DatasetId, f32)> = self
            .ids
            .iter()
            .zip(&self.vectors)
            .map(|(id, v)| (id.clone(), dot(&q, v)))
            .collect();
        scored.sort_by(by_score_then_id);
        scored.truncate(k);
        Ok(scored)
    }
}

/// Similarity descending, then dataset id ascending.
pub fn by_score_then_id(a: &(DatasetId, f32), b: &(DatasetId, f32)) -> Ordering {
    b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0))
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn normalize(v: &[f32]) -> Option<Vec<f32>> {
    if v.iter().any(|x| !x.is_finite()) {
        return None;
    }
    let norm = dot(v, v).sqrt();
    if norm <= f32::EPSILON {
        return None;
    }
    Some(v.iter().map(|x| x / norm).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_vectors_are_not_indexed() {
        let mut index = FlatVectorIndex::default();
        index.insert(DatasetId::from("z"), &[0.0, 0.0]);
        index.insert(DatasetId::from("a"), &[1.0, 0.0]);
        index.insert(DatasetId::from("short"), &[1.0]);
        assert_eq!(index.len(), 1);
        assert_eq!(index.dim(), 2);
    }
}
