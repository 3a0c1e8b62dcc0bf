use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use geoseek_core::traits::{DatasetIndex, EmbeddingProvider};
use geoseek_core::{DatasetId, Error, Result};

use crate::cosine::by_score_then_id;

const TIE_SLACK: usize = 8;

/// Embeds the semantic part of a query and asks the index for neighbours.
pub struct SemanticRanker {
    provider: Arc<dyn EmbeddingProvider>,
    timeout: Duration,
    min_similarity: Option<f32>,
}

impl SemanticRanker {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, timeout: Duration) -> Self {
        Self { provider, timeout, min_similarity: None }
    }

    /// Drop hits scoring below `min`.
    pub fn with_min_similarity(mut self, min: Option<f32>) -> Self {
        self.min_similarity = min;
        self
    }

    pub fn provider_id(&self) -> &str { self.provider.provider_id() }

    /// At most `k` `(id, similarity)` pairs, best first, id ascending on ties.
    pub async fn rank(&self, index: &dyn DatasetIndex, query_text: &str, k: usize) -> Result<Vec<(DatasetId, f32)>> {
        if k == 0 {
            return Err(Error::invalid("k must be positive"));
        }
        let embedding = match tokio::time::timeout(self.timeout, self.provider.embed(query_text)).await {
            Ok(Ok(v)) => v,
            Ok(Err(e)) => {
                warn!(provider = self.provider.provider_id(), error = %e, "query embedding failed");
                return Err(match e {
                    Error::EmbeddingUnavailable(_) => e,
                    other => Error::EmbeddingUnavailable(other.to_string()),
                });
            }
            Err(_) => {
                warn!(provider = self.provider.provider_id(), timeout_ms = self.timeout.as_millis() as u64, "query embedding timed out");
                return Err(Error::EmbeddingUnavailable(format!("timed out after {:?}", self.timeout)));
            }
        };
        if embedding.len() != self.provider.dim() {
            return Err(Error::EmbeddingUnavailable(format!(
                "provider returned {} dims, expected {}",
                embedding.len(),
                self.provider.dim()
            )));
        }

        // Backends cut at `limit` in their own order; the slack lets ties at
        // the k-th score resolve by id here.
        let mut hits = index.vector_query(&embedding, k.saturating_add(TIE_SLACK)).await?;
        if let Some(min) = self.min_similarity {
            hits.retain(|(_, s)| *s >= min);
        }
        hits.sort_by(by_score_then_id);
        hits.truncate(k);
        debug!(k, hits = hits.len(), "semantic ranking");
        Ok(hits)
    }
}
