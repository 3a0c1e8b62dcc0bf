//! Hybrid merge of spatial matches and semantic neighbours.
//!
//! With a resolved place, the spatial set is a hard filter: semantic hits
//! outside it are dropped, datasets in both sets score
//! `α·spatial + (1-α)·semantic`, and spatial-only datasets score
//! `α·spatial` and rank below any dataset matching both on exact ties.
//! Without a place, the combined score is the semantic similarity.

use std::cmp::Ordering;
use std::collections::HashMap;

use geoseek_core::{DatasetId, Error, Result, ScoredCandidate};
use geoseek_spatial::SpatialMatches;

#[derive(Debug, Clone, Copy)]
pub struct HybridMerger {
    alpha: f32,
}

impl HybridMerger {
    pub const DEFAULT_ALPHA: f32 = 0.5;

    pub fn new(alpha: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&alpha) {
            return Err(Error::invalid(format!("merge weight alpha must be in [0, 1], got {alpha}")));
        }
        Ok(Self { alpha })
    }

    pub fn alpha(&self) -> f32 { self.alpha }

    pub fn merge(
        &self,
        spatial: &SpatialMatches,
        semantic: &[(DatasetId, f32)],
        spatial_available: bool,
        top_k: usize,
    ) -> Vec<ScoredCandidate> {
        let mut semantic_by_id: HashMap<&DatasetId, f32> = HashMap::with_capacity(semantic.len());
        for (id, score) in semantic {
            semantic_by_id.entry(id).or_insert(*score);
        }

        let mut ranked: Vec<(ScoredCandidate, bool)> = if spatial_available {
            spatial
                .iter()
                .map(|(id, &spatial_score)| match semantic_by_id.get(id) {
                    Some(&s) => {
                        let s = s.clamp(0.0, 1.0);
                        let combined = self.alpha * spatial_score + (1.0 - self.alpha) * s;
                        (candidate(id, spatial_score, s, combined), true)
                    }
                    None => (candidate(id, spatial_score, 0.0, self.alpha * spatial_score), false),
                })
                .collect()
        } else {
            semantic_by_id.iter().map(|(id, &s)| (candidate(id, 0.0, s, s), true)).collect()
        };

        ranked.sort_by(|(a, a_both), (b, b_both)| {
            b.combined_score
                .total_cmp(&a.combined_score)
                .then_with(|| match (a_both, b_both) {
                    (true, false) => Ordering::Less,
                    (false, true) => Ordering::Greater,
                    _ => Ordering::Equal,
                })
                .then_with(|| a.dataset_id.cmp(&b.dataset_id))
        });
        ranked.truncate(top_k);
        ranked.into_iter().map(|(c, _)| c).collect()
    }
}

impl Default for HybridMerger {
    fn default() -> Self { Self { alpha: Self::DEFAULT_ALPHA } }
}

fn candidate(id: &DatasetId, spatial_score: f32, semantic_score: f32, combined_score: f32) -> ScoredCandidate {
    ScoredCandidate { dataset_id: id.clone(), spatial_score, semantic_score, combined_score }
}
