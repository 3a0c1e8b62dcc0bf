//! geoseek-vector
//!
//! Semantic ranking over dataset embeddings: an exact in-memory cosine index,
//! the ranker stage and the LanceDB-backed dataset table.

pub mod cosine;
pub mod lance;
pub mod ranker;
pub mod schema;
pub mod writer;

pub use cosine::FlatVectorIndex;
pub use lance::LanceDatasetIndex;
pub use ranker::SemanticRanker;
pub use writer::LanceDatasetWriter;
