/// Embedding capability consumed by index rebuilds and queries.
///
/// Implementations must be order preserving and deterministic for identical
/// input, and every returned vector must have exactly `dim()` components.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}
