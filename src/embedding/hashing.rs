/// Deterministic feature-hashing embeddings for offline use
use super::provider::{validate_text, EmbeddingError, EmbeddingProvider, Vector};
use async_trait::async_trait;
use regex::Regex;

const MAX_TEXT_CHARS: usize = 100_000;

/// Hashes lowercase word tokens into signed buckets and L2-normalises the result.
///
/// No model, no network: the same text always maps to the same vector, on every
/// machine. Texts sharing vocabulary land close together, which is enough for
/// keyword-ish retrieval and for reproducible tests.
pub struct HashingProvider {
    dimension: usize,
    model_name: String,
    token: Regex,
}

impl HashingProvider {
    pub fn new(dimension: usize) -> Result<Self, EmbeddingError> {
        if dimension == 0 {
            return Err(EmbeddingError::InitializationError(
                "Embedding dimension must be greater than 0".to_string(),
            ));
        }

        let token = Regex::new(r"\w+")
            .map_err(|e| EmbeddingError::InitializationError(e.to_string()))?;

        Ok(Self {
            dimension,
            model_name: format!("blake3-hashing-{}", dimension),
            token,
        })
    }

    fn bucket(&self, token: &str) -> (usize, f32) {
        let hash = blake3::hash(token.as_bytes());
        let bytes = hash.as_bytes();

        let mut head = [0u8; 8];
        head.copy_from_slice(&bytes[..8]);
        let index = (u64::from_le_bytes(head) % self.dimension as u64) as usize;
        let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };

        (index, sign)
    }
}

#[async_trait]
impl EmbeddingProvider for HashingProvider {
    async fn embed(&self, text: &str) -> Result<Vector, EmbeddingError> {
        validate_text(text, MAX_TEXT_CHARS)?;

        let lowered = text.to_lowercase();
        let mut vector = vec![0.0f32; self.dimension];
        let mut tokens = 0usize;

        for m in self.token.find_iter(&lowered) {
            let (index, sign) = self.bucket(m.as_str());
            vector[index] += sign;
            tokens += 1;
        }

        // Punctuation or symbol-only text hashes as one token
        if tokens == 0 {
            let (index, sign) = self.bucket(lowered.trim());
            vector[index] += sign;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }

        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
    }

    #[tokio::test]
    async fn test_deterministic() {
        let provider = HashingProvider::new(64).unwrap();
        let a = provider.embed("Delivery was slow").await.unwrap();
        let b = provider.embed("delivery WAS slow!").await.unwrap();

        assert_eq!(a.len(), 64);
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_normalized() {
        let provider = HashingProvider::new(32).unwrap();
        let v = provider.embed("one two three four").await.unwrap();
        let magnitude = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_shared_vocabulary_is_closer() {
        let provider = HashingProvider::new(256).unwrap();
        let query = provider.embed("shipping delays").await.unwrap();
        let near = provider
            .embed("Shipping took a week and caused delays")
            .await
            .unwrap();
        let far = provider
            .embed("The product quality is excellent")
            .await
            .unwrap();

        assert!(squared_distance(&query, &near) < squared_distance(&query, &far));
    }

    #[tokio::test]
    async fn test_symbol_only_text_embeds() {
        let provider = HashingProvider::new(16).unwrap();

        let dashes = provider.embed("---").await.unwrap();
        assert_eq!(dashes.len(), 16);
        let magnitude = dashes.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 1e-5);

        assert_eq!(dashes, provider.embed("  ---  ").await.unwrap());
        assert!(provider.embed("?!").await.is_ok());
    }

    #[tokio::test]
    async fn test_rejects_empty_text() {
        let provider = HashingProvider::new(16).unwrap();
        assert!(matches!(
            provider.embed("").await,
            Err(EmbeddingError::InvalidInput(_))
        ));
        assert!(matches!(
            provider.embed("   ").await,
            Err(EmbeddingError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_zero_dimension_rejected() {
        assert!(HashingProvider::new(0).is_err());
    }
}
