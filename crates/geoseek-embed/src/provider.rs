use async_trait::async_trait;
use std::sync::Arc;

use geoseek_core::traits::{Embedder, EmbeddingProvider};
use geoseek_core::{Error, Result};

/// Exposes an in-process [`Embedder`] as an async [`EmbeddingProvider`],
/// running inference on the blocking pool so model work never stalls the
/// runtime.
pub struct BlockingProvider<E> {
    inner: Arc<E>,
    id: String,
}

impl<E: Embedder + 'static> BlockingProvider<E> {
    pub fn new(inner: E, label: &str) -> Self {
        let id = format!("{}:d{}", label, inner.dim());
        Self { inner: Arc::new(inner), id }
    }
}

#[async_trait]
impl<E: Embedder + 'static> EmbeddingProvider for BlockingProvider<E> {
    fn provider_id(&self) -> &str { &self.id }

    fn dim(&self) -> usize { self.inner.dim() }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let inner = Arc::clone(&self.inner);
        let text = vec![text.to_string()];
        let mut out = tokio::task::spawn_blocking(move || inner.embed_batch(&text))
            .await
            .map_err(|e| Error::EmbeddingUnavailable(format!("embedding task failed: {e}")))?
            .map_err(|e| Error::EmbeddingUnavailable(e.to_string()))?;
        out.pop().ok_or_else(|| Error::EmbeddingUnavailable("embedder returned no vector".into()))
    }
}
