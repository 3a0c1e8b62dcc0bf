//! geoseek-core
//!
//! Domain types, geometry, errors, capability traits and configuration shared
//! by the retrieval crates.

pub mod catalog;
pub mod config;
pub mod error;
pub mod geo;
pub mod index;
pub mod traits;
pub mod types;

pub use error::{Error, ErrorKind, Result};
pub use geo::{BoundingBox, Extent, Geometry, Polygon, SpatialRelation};
pub use index::IndexHandle;
pub use types::{
    DatasetId, DatasetRecord, Degradations, Query, RankedDataset, RetrievalRequest, RetrievalResult,
    ScoredCandidate, SpatialSkip, Stage,
};
