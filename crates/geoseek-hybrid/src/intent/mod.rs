//! Query intent extraction: split free text into a place name and the
//! semantic part of the request.
//!
//! A configured [`IntentModel`] is asked first, bounded by a timeout; any
//! failure falls back to the pattern rules in [`rules`]. Extraction never
//! fails: in the worst case the whole text becomes the semantic query.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use geoseek_core::traits::{IntentModel, ParsedIntent};
use geoseek_core::Query;

pub mod llm;
pub mod rules;

pub use llm::ChatIntentModel;

pub struct IntentExtractor {
    model: Option<Arc<dyn IntentModel>>,
    timeout: Duration,
}

impl IntentExtractor {
    pub fn rule_based() -> Self {
        Self { model: None, timeout: Duration::ZERO }
    }

    pub fn with_model(model: Arc<dyn IntentModel>, timeout: Duration) -> Self {
        Self { model: Some(model), timeout }
    }

    pub async fn extract(&self, raw_text: &str) -> Query {
        if let Some(model) = &self.model {
            match tokio::time::timeout(self.timeout, model.parse(raw_text)).await {
                Ok(Ok(intent)) => match from_intent(raw_text, intent) {
                    Some(query) => {
                        debug!(model = model.name(), place = ?query.place_name, semantic = %query.semantic_text, "intent from model");
                        return query;
                    }
                    None => warn!(model = model.name(), "intent model answer unusable; using rules"),
                },
                Ok(Err(e)) => warn!(model = model.name(), error = %e, "intent model failed; using rules"),
                Err(_) => warn!(model = model.name(), timeout_ms = self.timeout.as_millis() as u64, "intent model timed out; using rules"),
            }
        }
        from_rules(raw_text)
    }
}

fn from_rules(raw_text: &str) -> Query {
    let split = rules::split(raw_text);
    let mut query = Query::semantic_only(raw_text.trim());
    if !split.what.is_empty() {
        query.semantic_text = split.what;
    }
    query.place_name = split.place;
    query
}

/// `None` when the model returned nothing to search for.
fn from_intent(raw_text: &str, intent: ParsedIntent) -> Option<Query> {
    let place_name = intent
        .locations
        .iter()
        .map(|l| l.trim())
        .find(|l| !l.is_empty())
        .map(str::to_string);
    let terms: Vec<&str> = std::iter::once(intent.raw_theme.as_str())
        .chain(intent.themes.iter().map(String::as_str))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect();
    if terms.is_empty() && place_name.is_none() {
        return None;
    }
    let mut query = Query::semantic_only(raw_text.trim());
    if !terms.is_empty() {
        query.semantic_text = terms.join(" ");
    }
    query.place_name = place_name;
    query.themes = intent.themes.into_iter().filter(|t| !t.trim().is_empty()).collect();
    query.publishers = intent.publishers;
    query.language = intent.language.filter(|l| !l.trim().is_empty());
    Some(query)
}
