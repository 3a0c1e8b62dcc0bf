use anyhow::{Context, Result};
use async_trait::async_trait;

use geoseek_core::traits::{IntentModel, ParsedIntent};

use crate::chat::{ChatClient, ChatMessage};

const SYSTEM_PROMPT: &str = "You are a geospatial query specialist that helps users find spatial datasets. \
You understand what users are looking for in terms of geographic locations, data themes and publishers.";

const USER_PROMPT: &str = r#"Extract from this dataset search query:
1. raw_theme: the core search phrase, in the user's exact wording
2. locations: place names to geocode (cities, countries, regions)
3. themes: related topics not stated explicitly, in the language of raw_theme
4. publishers: organisations or data publishers mentioned
5. language: the language of the query

Answer with a single JSON object with keys raw_theme (string), locations (array of strings), themes (array of strings), publishers (array of strings), language (string).

Query: "#;

/// Language-model intent parser over an OpenAI-compatible chat endpoint.
pub struct ChatIntentModel {
    client: ChatClient,
    model: String,
    temperature: f32,
}

impl ChatIntentModel {
    pub fn new(client: ChatClient, model: impl Into<String>, temperature: f32) -> Self {
        Self { client, model: model.into(), temperature }
    }
}

#[async_trait]
impl IntentModel for ChatIntentModel {
    fn name(&self) -> &str { &self.model }

    async fn parse(&self, raw_text: &str) -> Result<ParsedIntent> {
        let messages = [ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(format!("{USER_PROMPT}{raw_text}"))];
        let answer = self.client.complete(&self.model, self.temperature, &messages, true).await?;
        parse_answer(&answer)
    }
}

/// Accepts a bare object or one wrapped in a fenced code block.
fn parse_answer(answer: &str) -> Result<ParsedIntent> {
    let trimmed = answer.trim();
    let body = match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if end > start => &trimmed[start..=end],
        _ => trimmed,
    };
    serde_json::from_str(body).context("intent answer is not the expected JSON object")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_json() {
        let answer = "```json\n{\"raw_theme\":\"parks\",\"locations\":[\"Berlin\"],\"language\":\"English\"}\n```";
        let intent = parse_answer(answer).unwrap();
        assert_eq!(intent.raw_theme, "parks");
        assert_eq!(intent.locations, vec!["Berlin".to_string()]);
        assert!(intent.themes.is_empty());
    }

    #[test]
    fn rejects_prose() {
        assert!(parse_answer("I cannot help with that").is_err());
    }
}
