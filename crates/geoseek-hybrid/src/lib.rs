//! geoseek-hybrid
//!
//! Hybrid retrieval orchestration: intent extraction, geocoding, the merge of
//! spatial and semantic results, and grounded answer synthesis.

pub mod chat;
pub mod geocode;
pub mod intent;
pub mod merge;
pub mod orchestrator;
pub mod setup;
pub mod snapshot;
pub mod synthesize;

pub use geocode::{Gazetteer, GeocoderAdapter, NominatimGeocoder};
pub use intent::IntentExtractor;
pub use merge::HybridMerger;
pub use orchestrator::{Components, Orchestrator};
pub use snapshot::SnapshotIndex;
pub use synthesize::{AnswerSynthesizer, NO_MATCHES_MESSAGE};
