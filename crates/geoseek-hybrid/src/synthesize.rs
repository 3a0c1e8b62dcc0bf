//! Grounded answer text over the ranked datasets.

use async_trait::async_trait;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use geoseek_core::traits::{ContextBlock, GenerationProvider};
use geoseek_core::{DatasetRecord, Error, Query, Result};

use crate::chat::{ChatClient, ChatMessage};

/// Returned for an empty candidate list; the generator is not called.
pub const NO_MATCHES_MESSAGE: &str = "No matching datasets found.";

const SNIPPET_CHARS: usize = 300;

const SYSTEM_PROMPT: &str = "You are a helpful assistant for a spatial data search system. \
Based on the user's query and the retrieved datasets, give a concise, informative answer.";

pub struct AnswerSynthesizer {
    generator: Arc<dyn GenerationProvider>,
    timeout: Duration,
}

impl AnswerSynthesizer {
    pub fn new(generator: Arc<dyn GenerationProvider>, timeout: Duration) -> Self {
        Self { generator, timeout }
    }

    pub async fn synthesize(&self, query: &Query, records: &[DatasetRecord]) -> Result<String> {
        if records.is_empty() {
            return Ok(NO_MATCHES_MESSAGE.to_string());
        }
        let blocks: Vec<ContextBlock> = records.iter().map(context_block).collect();
        let instructions = instructions(query);
        match tokio::time::timeout(self.timeout, self.generator.generate(&blocks, &instructions)).await {
            Ok(Ok(text)) => {
                debug!(generator = self.generator.name(), blocks = blocks.len(), "answer synthesized");
                Ok(text)
            }
            Ok(Err(e)) => {
                warn!(generator = self.generator.name(), error = %e, "answer generation failed");
                Err(match e {
                    Error::SynthesisUnavailable(_) => e,
                    other => Error::SynthesisUnavailable(other.to_string()),
                })
            }
            Err(_) => {
                warn!(generator = self.generator.name(), "answer generation timed out");
                Err(Error::SynthesisUnavailable(format!("timed out after {:?}", self.timeout)))
            }
        }
    }
}

fn context_block(record: &DatasetRecord) -> ContextBlock {
    ContextBlock {
        dataset_id: record.id.clone(),
        title: record.title.clone(),
        snippet: truncate_chars(&record.description, SNIPPET_CHARS),
    }
}

fn instructions(query: &Query) -> String {
    let mut s = format!("User query: {}\n", query.raw_text);
    if let Some(place) = &query.place_name {
        let _ = writeln!(s, "Location of interest: {place}");
    }
    s.push_str(
        "Guidelines:\n\
         - Directly address the user's query.\n\
         - Recommend the most relevant of the listed datasets, most relevant first.\n\
         - Cite every dataset you mention by its identifier in square brackets, e.g. [ds-12].\n\
         - Use only the listed datasets; do not invent others.",
    );
    s
}

/// At most `max` characters, cut on a char boundary, with an ellipsis when cut.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", text[..idx].trim_end()),
        None => text.to_string(),
    }
}

/// Renders context blocks as `[id] title` followed by the snippet.
pub fn render_blocks(blocks: &[ContextBlock]) -> String {
    let mut out = String::new();
    for b in blocks {
        let _ = writeln!(out, "[{}] {}", b.dataset_id, b.title);
        if !b.snippet.is_empty() {
            let _ = writeln!(out, "{}", b.snippet);
        }
        out.push('\n');
    }
    out
}

/// Generation over an OpenAI-compatible chat endpoint.
pub struct ChatGenerator {
    client: ChatClient,
    model: String,
    temperature: f32,
}

impl ChatGenerator {
    pub fn new(client: ChatClient, model: impl Into<String>, temperature: f32) -> Self {
        Self { client, model: model.into(), temperature }
    }
}

#[async_trait]
impl GenerationProvider for ChatGenerator {
    fn name(&self) -> &str { &self.model }

    async fn generate(&self, context: &[ContextBlock], instructions: &str) -> Result<String> {
        let user = format!("{instructions}\n\nRetrieved datasets:\n{}", render_blocks(context));
        let messages = [ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(user)];
        self.client
            .complete(&self.model, self.temperature, &messages, false)
            .await
            .map_err(|e| Error::SynthesisUnavailable(e.to_string()))
    }
}
