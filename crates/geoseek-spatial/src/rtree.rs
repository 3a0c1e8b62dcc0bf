//! Read-only R-tree, bulk loaded with Sort-Tile-Recursive packing.
//!
//! Built once per index snapshot and never mutated. Search prunes on
//! envelopes only; callers refine candidates against exact geometry.

use geoseek_core::geo::{BoundingBox, Extent, SpatialRelation};
use geoseek_core::traits::envelope_may_relate;

pub const DEFAULT_NODE_CAPACITY: usize = 16;

#[derive(Debug, Clone)]
struct Node {
    envelope: BoundingBox,
    start: usize,
    end: usize,
}

#[derive(Debug, Clone)]
pub struct PackedRTree<T> {
    items: Vec<(BoundingBox, T)>,
    /// `levels[0]` groups items into leaves; the last level holds the root(s).
    levels: Vec<Vec<Node>>,
}

impl<T> PackedRTree<T> {
    pub fn bulk_load(items: Vec<(BoundingBox, T)>) -> Self {
        Self::bulk_load_with_capacity(items, DEFAULT_NODE_CAPACITY)
    }

    pub fn bulk_load_with_capacity(mut items: Vec<(BoundingBox, T)>, capacity: usize) -> Self {
        let capacity = capacity.max(2);
        let mut levels = Vec::new();
        if items.is_empty() {
            return Self { items, levels };
        }

        str_sort(&mut items, capacity, |(b, _)| *b);
        let mut current = pack(&items, capacity, |(b, _)| *b);
        while current.len() > 1 {
            str_sort(&mut current, capacity, |n| n.envelope);
            let parents = pack(&current, capacity, |n| n.envelope);
            levels.push(current);
            current = parents;
        }
        levels.push(current);
        Self { items, levels }
    }

    pub fn len(&self) -> usize { self.items.len() }

    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    pub fn height(&self) -> usize { self.levels.len() }

    /// Items whose envelope may satisfy `relation` against `extent`.
    pub fn search(&self, extent: &Extent, relation: SpatialRelation) -> Vec<&T> {
        let mut out = Vec::new();
        let Some(top) = self.levels.last() else { return out };
        let mut stack: Vec<(usize, usize)> = (0..top.len()).map(|i| (self.levels.len() - 1, i)).collect();
        while let Some((level, idx)) = stack.pop() {
            let node = &self.levels[level][idx];
            if !envelope_may_relate(&node.envelope, extent, relation) {
                continue;
            }
            if level == 0 {
                for (bbox, item) in &self.items[node.start..node.end] {
                    if envelope_may_relate(bbox, extent, relation) {
                        out.push(item);
                    }
                }
            } else {
                stack.extend((node.start..node.end).map(|child| (level - 1, child)));
            }
        }
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = &(BoundingBox, T)> { self.items.iter() }
}

fn center_x(b: &BoundingBox) -> f64 { b.center().0 }
fn center_y(b: &BoundingBox) -> f64 { b.center().1 }

/// Order entries into vertical slices by x centre, each slice sorted by y.
fn str_sort<E>(entries: &mut [E], capacity: usize, envelope: impl Fn(&E) -> BoundingBox) {
    let n = entries.len();
    let leaves = n.div_ceil(capacity);
    let slices = (leaves as f64).sqrt().ceil().max(1.0) as usize;
    let slice_len = capacity * slices;
    entries.sort_by(|a, b| center_x(&envelope(a)).total_cmp(&center_x(&envelope(b))));
    for chunk in entries.chunks_mut(slice_len) {
        chunk.sort_by(|a, b| center_y(&envelope(a)).total_cmp(&center_y(&envelope(b))));
    }
}

fn pack<E>(entries: &[E], capacity: usize, envelope: impl Fn(&E) -> BoundingBox) -> Vec<Node> {
    entries
        .chunks(capacity)
        .enumerate()
        .filter_map(|(i, chunk)| {
            let mut iter = chunk.iter().map(&envelope);
            let first = iter.next()?;
            let env = iter.fold(first, |acc, b| acc.union(&b));
            let start = i * capacity;
            Some(Node { envelope: env, start, end: start + chunk.len() })
        })
        .collect()
}
