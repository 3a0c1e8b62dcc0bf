//! geoseek-spatial
//!
//! Envelope R-tree and the spatial filter stage of retrieval.

pub mod filter;
pub mod rtree;

pub use filter::{SpatialFilter, SpatialMatches, SpatialOutcome};
pub use rtree::PackedRTree;
