//! Ollama embedding provider (`POST /api/embed`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use geoseek_core::traits::EmbeddingProvider;
use geoseek_core::{Error, Result};

pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dim: usize,
    id: String,
}

#[derive(Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaProvider {
    pub fn new(base_url: &str, model: &str, dim: usize) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            dim,
            id: format!("ollama:{model}:d{dim}"),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn provider_id(&self) -> &str { &self.id }

    fn dim(&self) -> usize { self.dim }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embed", self.base_url);
        let request = OllamaEmbedRequest { model: &self.model, input: vec![text] };
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::EmbeddingUnavailable(format!("Ollama HTTP error: {e}")))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::EmbeddingUnavailable(format!("Ollama returned {status}: {body}")));
        }
        let mut resp: OllamaEmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::EmbeddingUnavailable(format!("Ollama JSON parse error: {e}")))?;
        let v = resp.embeddings.pop().ok_or_else(|| Error::EmbeddingUnavailable("Ollama returned no embedding".into()))?;
        debug!(model = %self.model, dim = v.len(), "ollama embedding");
        if v.len() != self.dim {
            return Err(Error::EmbeddingUnavailable(format!("Ollama returned {} dims, expected {}", v.len(), self.dim)));
        }
        Ok(v)
    }
}
