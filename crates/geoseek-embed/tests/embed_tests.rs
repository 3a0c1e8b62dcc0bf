use geoseek_core::config::{EmbeddingBackend, EmbeddingSettings};
use geoseek_core::traits::{Embedder, EmbeddingProvider};
use geoseek_embed::{build_provider, get_default_embedder, BlockingProvider, FakeEmbedder};

fn fake_settings(dim: usize) -> EmbeddingSettings {
    EmbeddingSettings { backend: EmbeddingBackend::Fake, dim, ..EmbeddingSettings::default() }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[test]
fn fake_embedder_shapes_and_determinism() {
    let embedder = get_default_embedder(&fake_settings(1024)).expect("embedder");
    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(v1.len(), 1024);
    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");
    for (a, b) in v1.iter().zip(v2.iter()) { assert!((a - b).abs() <= 1e-6); }
}

#[test]
fn shared_words_score_closer_than_disjoint_text() {
    let e = FakeEmbedder::new(256);
    let q = e.embed_text("public parks");
    let near = e.embed_text("Parks and public green areas");
    let far = e.embed_text("railway timetable");
    assert!(cosine(&q, &near) > cosine(&q, &far));
}

#[test]
fn empty_text_embeds_to_zero_vector() {
    let e = FakeEmbedder::new(8);
    let v = e.embed_text("  ");
    assert_eq!(v.len(), 8);
    assert!(v.iter().all(|x| *x == 0.0));
}

#[tokio::test]
async fn blocking_provider_bridges_to_async() {
    let provider = BlockingProvider::new(FakeEmbedder::new(32), "fake");
    assert_eq!(provider.dim(), 32);
    assert_eq!(provider.provider_id(), "fake:d32");
    let v = provider.embed("urban trees").await.expect("embed");
    assert_eq!(v, FakeEmbedder::new(32).embed_text("urban trees"));
}

#[tokio::test]
async fn build_provider_respects_fake_backend() {
    let provider = build_provider(&fake_settings(16)).expect("provider");
    assert_eq!(provider.dim(), 16);
    assert_eq!(provider.embed("rivers").await.expect("embed").len(), 16);
}
