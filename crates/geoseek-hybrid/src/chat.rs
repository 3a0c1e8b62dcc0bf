//! Minimal client for OpenAI-compatible `/chat/completions` endpoints,
//! shared by the intent model and the answer generator.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use geoseek_core::config::LlmSettings;

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self { Self { role: "system", content: content.into() } }
    pub fn user(content: impl Into<String>) -> Self { Self { role: "user", content: content.into() } }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl ChatClient {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::builder().build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// The API key is read from the environment variable named in
    /// `llm.api_key_env`; a missing key is allowed for local servers.
    pub fn from_settings(settings: &LlmSettings) -> Result<Self> {
        let api_key = std::env::var(&settings.api_key_env).ok().filter(|k| !k.trim().is_empty());
        Self::new(&settings.base_url, api_key)
    }

    /// First choice's message content. `json_mode` asks the server for a JSON
    /// object answer.
    pub async fn complete(&self, model: &str, temperature: f32, messages: &[ChatMessage], json_mode: bool) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model,
            temperature,
            messages,
            response_format: json_mode.then_some(ResponseFormat { kind: "json_object" }),
        };
        let mut req = self.http.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let response = req.send().await.with_context(|| format!("POST {url}"))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("chat completion returned {status}: {text}"));
        }
        let parsed: ChatResponse = response.json().await.context("chat completion JSON")?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow!("chat completion had no content"))?;
        debug!(model, chars = content.len(), "chat completion");
        Ok(content)
    }
}
