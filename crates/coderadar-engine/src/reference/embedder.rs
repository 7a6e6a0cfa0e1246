use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::EmbedderError;
use crate::traits::Embedder;

/// Deterministic, dependency-free stand-in for a real embedding model.
/// Projects each text onto a fixed-width vector by hashing
/// `"{text}:{dim_index}"` and
/// mapping the digest's leading bytes into `[-1, 1]`, so the same text
/// always yields the same vector and distinct texts are very likely to
/// diverge in most dimensions.
pub struct HashEmbedder {
    model_id: String,
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            model_id: format!("hash-projection-{dimension}"),
            dimension,
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        (0..self.dimension)
            .map(|i| {
                let mut hasher = Sha256::new();
                hasher.update(text.as_bytes());
                hasher.update(b":");
                hasher.update(i.to_le_bytes());
                let digest = hasher.finalize();
                let raw = u16::from_le_bytes([digest[0], digest[1]]);
                (raw as f32 / u16::MAX as f32) * 2.0 - 1.0
            })
            .collect()
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        if self.dimension == 0 {
            return Err(EmbedderError::Failed {
                reason: "embedder dimension must be nonzero".to_string(),
            });
        }
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_text_produces_same_vector() {
        let embedder = HashEmbedder::new(8);
        let a = embedder.embed(&["fn greet() {}".to_string()]).await.unwrap();
        let b = embedder.embed(&["fn greet() {}".to_string()]).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn distinct_texts_produce_distinct_vectors() {
        let embedder = HashEmbedder::new(8);
        let result = embedder
            .embed(&["fn greet() {}".to_string(), "fn farewell() {}".to_string()])
            .await
            .unwrap();
        assert_ne!(result[0], result[1]);
    }

    #[tokio::test]
    async fn vectors_have_the_configured_dimension() {
        let embedder = HashEmbedder::new(16);
        let result = embedder.embed(&["x".to_string()]).await.unwrap();
        assert_eq!(result[0].len(), 16);
    }

    #[tokio::test]
    async fn values_stay_within_unit_range() {
        let embedder = HashEmbedder::new(32);
        let result = embedder.embed(&["some longer bit of source text".to_string()]).await.unwrap();
        for v in &result[0] {
            assert!(*v >= -1.0 && *v <= 1.0);
        }
    }

    #[tokio::test]
    async fn zero_dimension_is_rejected() {
        let embedder = HashEmbedder::new(0);
        let err = embedder.embed(&["x".to_string()]).await.unwrap_err();
        assert!(matches!(err, EmbedderError::Failed { .. }));
    }

    #[test]
    fn model_id_encodes_dimension() {
        let embedder = HashEmbedder::new(384);
        assert_eq!(embedder.model_id(), "hash-projection-384");
        assert_eq!(embedder.dimension(), 384);
    }
}
