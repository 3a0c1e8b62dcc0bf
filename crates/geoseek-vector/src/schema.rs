//! Arrow layout of the LanceDB `datasets` table.
//!
//! Structured record fields that have no natural column type (keywords,
//! metadata, geometry) are stored as JSON text. The envelope is denormalised
//! into four nullable float columns so spatial queries can prefilter in SQL.

use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

pub const ID: &str = "id";
pub const TITLE: &str = "title";
pub const DESCRIPTION: &str = "description";
pub const KEYWORDS: &str = "keywords";
pub const PUBLISHER: &str = "publisher";
pub const METADATA: &str = "metadata";
pub const GEOMETRY: &str = "geometry";
pub const MIN_LON: &str = "min_lon";
pub const MIN_LAT: &str = "min_lat";
pub const MAX_LON: &str = "max_lon";
pub const MAX_LAT: &str = "max_lat";
pub const VECTOR: &str = "vector";

/// Columns carrying a scalar BTree index; `spatial_query` needs all four.
pub const ENVELOPE_COLUMNS: [&str; 4] = [MIN_LON, MIN_LAT, MAX_LON, MAX_LAT];

pub fn build_dataset_schema(dim: i32) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new(ID, DataType::Utf8, false),
        Field::new(TITLE, DataType::Utf8, false),
        Field::new(DESCRIPTION, DataType::Utf8, false),
        Field::new(KEYWORDS, DataType::Utf8, false),
        Field::new(PUBLISHER, DataType::Utf8, true),
        Field::new(METADATA, DataType::Utf8, false),
        Field::new(GEOMETRY, DataType::Utf8, true),
        Field::new(MIN_LON, DataType::Float64, true),
        Field::new(MIN_LAT, DataType::Float64, true),
        Field::new(MAX_LON, DataType::Float64, true),
        Field::new(MAX_LAT, DataType::Float64, true),
        Field::new(VECTOR, DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
    ]))
}

/// Embedding width recorded in an existing table's schema.
pub fn vector_dim(schema: &Schema) -> Option<usize> {
    match schema.field_with_name(VECTOR).ok()?.data_type() {
        DataType::FixedSizeList(_, n) => usize::try_from(*n).ok(),
        _ => None,
    }
}
