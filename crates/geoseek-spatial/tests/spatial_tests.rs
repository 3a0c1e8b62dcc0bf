use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};

use geoseek_core::config::SpatialScoring;
use geoseek_core::geo::{BoundingBox, Extent, Geometry, Polygon, SpatialRelation};
use geoseek_core::traits::DatasetIndex;
use geoseek_core::{DatasetId, DatasetRecord, Error, ErrorKind, Result};
use geoseek_spatial::{PackedRTree, SpatialFilter};

fn bbox(a: f64, b: f64, c: f64, d: f64) -> BoundingBox {
    BoundingBox::new(a, b, c, d).unwrap()
}

fn berlin() -> Extent {
    Extent::single(bbox(13.08, 52.33, 13.76, 52.67))
}

/// Minimal index over footprints: the R-tree answers spatial queries unless
/// it is switched off.
struct FootprintIndex {
    footprints: Vec<(DatasetId, Geometry)>,
    tree: Option<PackedRTree<usize>>,
    scan_fails: bool,
}

impl FootprintIndex {
    fn new(footprints: Vec<(&str, Geometry)>) -> Self {
        let footprints: Vec<_> = footprints.into_iter().map(|(id, g)| (DatasetId::from(id), g)).collect();
        let tree = PackedRTree::bulk_load(footprints.iter().enumerate().map(|(i, (_, g))| (g.envelope(), i)).collect());
        Self { footprints, tree: Some(tree), scan_fails: false }
    }
}

#[async_trait]
impl DatasetIndex for FootprintIndex {
    async fn lookup_by_ids(&self, ids: &[DatasetId]) -> Result<HashMap<DatasetId, DatasetRecord>> {
        Ok(self
            .footprints
            .iter()
            .filter(|(id, _)| ids.contains(id))
            .map(|(id, g)| {
                let record = DatasetRecord {
                    id: id.clone(),
                    title: id.to_string(),
                    description: String::new(),
                    keywords: Vec::new(),
                    publisher: None,
                    metadata: Default::default(),
                    geometry: Some(g.clone()),
                    embedding: None,
                };
                (id.clone(), record)
            })
            .collect())
    }

    async fn spatial_query(&self, extent: &Extent, relation: SpatialRelation) -> Result<BTreeSet<DatasetId>> {
        let tree = self.tree.as_ref().ok_or_else(|| Error::IndexUnavailable("no r-tree".into()))?;
        Ok(tree
            .search(extent, relation)
            .into_iter()
            .filter(|&&i| self.footprints[i].1.relates(relation, extent))
            .map(|&i| self.footprints[i].0.clone())
            .collect())
    }

    async fn vector_query(&self, _embedding: &[f32], _k: usize) -> Result<Vec<(DatasetId, f32)>> {
        Ok(Vec::new())
    }

    async fn footprints(&self) -> Result<Vec<(DatasetId, Geometry)>> {
        if self.scan_fails {
            return Err(Error::IndexUnavailable("storage offline".into()));
        }
        Ok(self.footprints.clone())
    }

    fn len(&self) -> usize { self.footprints.len() }
}

fn sample_index() -> FootprintIndex {
    FootprintIndex::new(vec![
        ("ds-12", Geometry::BoundingBox(bbox(13.0, 52.0, 14.0, 53.0))),
        ("ds-45", Geometry::BoundingBox(bbox(13.2, 52.4, 13.5, 52.6))),
        ("ds-99", Geometry::BoundingBox(bbox(2.2, 48.8, 2.5, 48.9))),
        (
            "ds-7",
            Geometry::Polygon(Polygon::new(vec![[13.7, 52.6], [14.5, 52.6], [14.5, 53.2]]).unwrap()),
        ),
    ])
}

fn ids(outcome: &geoseek_spatial::SpatialOutcome) -> Vec<&str> {
    outcome.matches.keys().map(DatasetId::as_str).collect()
}

#[tokio::test]
async fn intersects_excludes_far_away_datasets() {
    let index = sample_index();
    let outcome = SpatialFilter::default().filter(&index, &berlin(), SpatialRelation::Intersects).await.unwrap();
    assert_eq!(ids(&outcome), vec!["ds-12", "ds-45", "ds-7"]);
    assert!(!outcome.full_scan);
    assert!(outcome.matches.values().all(|s| *s == 1.0));
}

#[tokio::test]
async fn within_and_contains_narrow_the_set() {
    let index = sample_index();
    let filter = SpatialFilter::default();
    let within = filter.filter(&index, &berlin(), SpatialRelation::Within).await.unwrap();
    assert_eq!(ids(&within), vec!["ds-45"]);
    let contains = filter.filter(&index, &berlin(), SpatialRelation::Contains).await.unwrap();
    assert_eq!(ids(&contains), vec!["ds-12"]);
}

#[tokio::test]
async fn falls_back_to_full_scan_when_tree_is_missing() {
    let mut index = sample_index();
    let expected = SpatialFilter::default().filter(&index, &berlin(), SpatialRelation::Intersects).await.unwrap();
    index.tree = None;
    let outcome = SpatialFilter::default().filter(&index, &berlin(), SpatialRelation::Intersects).await.unwrap();
    assert!(outcome.full_scan);
    assert_eq!(outcome.matches, expected.matches);
}

#[tokio::test]
async fn fails_when_full_scan_also_fails() {
    let mut index = sample_index();
    index.tree = None;
    index.scan_fails = true;
    let err = SpatialFilter::default().filter(&index, &berlin(), SpatialRelation::Intersects).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IndexUnavailable);
}

#[tokio::test]
async fn overlap_scoring_grades_partial_cover() {
    let index = FootprintIndex::new(vec![
        ("inside", Geometry::BoundingBox(bbox(0.0, 0.0, 1.0, 1.0))),
        ("half", Geometry::BoundingBox(bbox(1.0, 0.0, 3.0, 1.0))),
    ]);
    let area = Extent::single(bbox(-1.0, -1.0, 2.0, 2.0));
    let outcome = SpatialFilter::new(SpatialScoring::OverlapRatio).filter(&index, &area, SpatialRelation::Intersects).await.unwrap();
    assert!((outcome.matches[&DatasetId::from("inside")] - 1.0).abs() < 1e-6);
    assert!((outcome.matches[&DatasetId::from("half")] - 0.5).abs() < 1e-6);
}

#[tokio::test]
async fn antimeridian_extent_matches_both_sides() {
    let index = FootprintIndex::new(vec![
        ("fiji-west", Geometry::BoundingBox(bbox(177.0, -19.0, 179.0, -16.0))),
        ("fiji-east", Geometry::BoundingBox(bbox(-179.9, -17.0, -178.5, -16.0))),
        ("samoa", Geometry::BoundingBox(bbox(-172.8, -14.1, -171.4, -13.4))),
    ]);
    let fiji = Extent::from_wrapping(176.0, -20.0, -178.0, -12.0).unwrap();
    let outcome = SpatialFilter::default().filter(&index, &fiji, SpatialRelation::Intersects).await.unwrap();
    assert_eq!(ids(&outcome), vec!["fiji-east", "fiji-west"]);
}

#[tokio::test]
async fn same_inputs_same_set() {
    let index = sample_index();
    let filter = SpatialFilter::default();
    let a = filter.filter(&index, &berlin(), SpatialRelation::Intersects).await.unwrap();
    let b = filter.filter(&index, &berlin(), SpatialRelation::Intersects).await.unwrap();
    assert_eq!(a, b);
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    fn arb_box() -> impl Strategy<Value = BoundingBox> {
        (-170.0f64..160.0, -80.0f64..70.0, 0.1f64..20.0, 0.1f64..10.0)
            .prop_map(|(x, y, w, h)| bbox(x, y, x + w, y + h))
    }

    proptest! {
        #[test]
        fn within_is_subset_of_intersects(boxes in prop::collection::vec(arb_box(), 1..60), q in arb_box()) {
            let footprints: Vec<_> = boxes.into_iter().enumerate()
                .map(|(i, b)| (DatasetId::new(format!("d{i}")), Geometry::BoundingBox(b)))
                .collect();
            let extent = Extent::single(q);
            let filter = SpatialFilter::default();
            let within = filter.scan(&footprints, &extent, SpatialRelation::Within);
            let intersects = filter.scan(&footprints, &extent, SpatialRelation::Intersects);
            for id in within.keys() {
                prop_assert!(intersects.contains_key(id));
            }
        }

        #[test]
        fn tree_search_agrees_with_brute_force(boxes in prop::collection::vec(arb_box(), 0..120), q in arb_box(), cap in 2usize..20) {
            let tree = PackedRTree::bulk_load_with_capacity(boxes.iter().copied().enumerate().map(|(i, b)| (b, i)).collect(), cap);
            let extent = Extent::single(q);
            for relation in [SpatialRelation::Intersects, SpatialRelation::Within, SpatialRelation::Contains] {
                let mut found: Vec<usize> = tree.search(&extent, relation).into_iter()
                    .copied()
                    .filter(|&i| Geometry::BoundingBox(boxes[i]).relates(relation, &extent))
                    .collect();
                found.sort_unstable();
                let expected: Vec<usize> = (0..boxes.len())
                    .filter(|&i| Geometry::BoundingBox(boxes[i]).relates(relation, &extent))
                    .collect();
                prop_assert_eq!(found, expected);
            }
        }
    }
}
