use crate::error::ProviderError;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 128;
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_EMBEDDING_BATCH_SIZE: usize = 64;

pub trait Embedder {
    fn model_name(&self) -> &str;

    fn dimensions(&self) -> Option<usize>;

    /// One vector per input, in input order.
    fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, ProviderError>;

    fn embed_query(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.embed_documents(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Embedding("no vector returned for query".to_string()))
    }
}

impl<E> Embedder for Box<E>
where
    E: Embedder + ?Sized,
{
    fn model_name(&self) -> &str {
        (**self).model_name()
    }

    fn dimensions(&self) -> Option<usize> {
        (**self).dimensions()
    }

    fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, ProviderError> {
        (**self).embed_documents(texts)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl CharacterNgramEmbedder {
    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let chars: Vec<char> = text.to_lowercase().chars().collect();

        for window in chars.windows(3) {
            let mut hash = 1469598103934665603u64;
            for ch in window {
                let mut buffer = [0u8; 4];
                for byte in ch.encode_utf8(&mut buffer).bytes() {
                    hash ^= byte as u64;
                    hash = hash.wrapping_mul(1099511628211);
                }
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

impl Embedder for CharacterNgramEmbedder {
    fn model_name(&self) -> &str {
        "char-trigram-fnv"
    }

    fn dimensions(&self) -> Option<usize> {
        Some(self.dimensions.max(1))
    }

    fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, ProviderError> {
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }
}

#[derive(Debug, Clone)]
pub struct HttpEmbedderConfig {
    /// Base URL of an OpenAI-compatible API; `/embeddings` is appended.
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub dimensions: Option<usize>,
    pub batch_size: usize,
    pub timeout: Duration,
}

impl HttpEmbedderConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            api_key: None,
            dimensions: None,
            batch_size: DEFAULT_EMBEDDING_BATCH_SIZE,
            timeout: Duration::from_secs(60),
        }
    }
}

pub struct HttpEmbedder {
    client: Client,
    endpoint: Url,
    model: String,
    api_key: Option<String>,
    dimensions: Option<usize>,
    batch_size: usize,
}

impl HttpEmbedder {
    pub fn new(config: HttpEmbedderConfig) -> Result<Self, ProviderError> {
        if config.model.trim().is_empty() {
            return Err(ProviderError::Embedding("missing embedding model name".to_string()));
        }
        if config.batch_size == 0 {
            return Err(ProviderError::Embedding("batch size must be positive".to_string()));
        }

        let base = Url::parse(config.endpoint.trim()).map_err(|error| {
            ProviderError::Embedding(format!("invalid endpoint {}: {error}", config.endpoint))
        })?;
        let endpoint = Url::parse(&format!(
            "{}/embeddings",
            base.as_str().trim_end_matches('/')
        ))
        .map_err(|error| ProviderError::Embedding(error.to_string()))?;

        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            endpoint,
            model: config.model,
            api_key: config
                .api_key
                .map(|key| key.trim().to_string())
                .filter(|key| !key.is_empty()),
            dimensions: config.dimensions,
            batch_size: config.batch_size,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let mut request = self.client.post(self.endpoint.clone()).json(&EmbeddingRequest {
            model: &self.model,
            input: inputs,
            dimensions: self.dimensions,
        });

        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(ProviderError::Embedding(format!(
                "{} returned {status}: {body}",
                self.endpoint
            )));
        }

        let payload: EmbeddingResponse = response.json()?;
        vectors_in_input_order(payload, inputs.len(), self.dimensions)
    }
}

impl Embedder for HttpEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            debug!(inputs = batch.len(), model = %self.model, "requesting embeddings");
            vectors.extend(self.embed_batch(batch)?);
        }
        Ok(vectors)
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

fn vectors_in_input_order(
    mut payload: EmbeddingResponse,
    expected: usize,
    dimensions: Option<usize>,
) -> Result<Vec<Vec<f32>>, ProviderError> {
    if payload.data.len() != expected {
        return Err(ProviderError::Embedding(format!(
            "received {} embeddings for {expected} inputs",
            payload.data.len()
        )));
    }

    payload.data.sort_by_key(|entry| entry.index);

    let width = dimensions.or_else(|| payload.data.first().map(|entry| entry.embedding.len()));
    if let Some(width) = width {
        if let Some(entry) = payload.data.iter().find(|entry| entry.embedding.len() != width) {
            return Err(ProviderError::Embedding(format!(
                "embedding {} has dimension {} instead of {width}",
                entry.index,
                entry.embedding.len()
            )));
        }
    }

    Ok(payload.data.into_iter().map(|entry| entry.embedding).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedder_is_deterministic() -> Result<(), ProviderError> {
        let embedder = CharacterNgramEmbedder::default();
        let first = embedder.embed_query("Hydraulic pressure and flow")?;
        let second = embedder.embed_query("Hydraulic pressure and flow")?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn embedder_outputs_expected_length() -> Result<(), ProviderError> {
        let embedder = CharacterNgramEmbedder { dimensions: 32 };
        let vectors = embedder.embed_documents(&["abc", "ünïcödé text"])?;
        assert_eq!(vectors.len(), 2);
        assert!(vectors.iter().all(|vector| vector.len() == 32));
        assert_eq!(embedder.dimensions(), Some(32));
        Ok(())
    }

    #[test]
    fn ngram_vectors_are_unit_length() -> Result<(), ProviderError> {
        let vector = CharacterNgramEmbedder::default().embed_query("filter replacement")?;
        let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
        Ok(())
    }

    #[test]
    fn http_endpoint_gets_embeddings_path() -> Result<(), ProviderError> {
        let embedder = HttpEmbedder::new(HttpEmbedderConfig::new("http://localhost:8080/v1/"))?;
        assert_eq!(embedder.endpoint().as_str(), "http://localhost:8080/v1/embeddings");
        Ok(())
    }

    #[test]
    fn http_embedder_rejects_bad_settings() {
        assert!(HttpEmbedder::new(HttpEmbedderConfig::new("not a url")).is_err());

        let mut config = HttpEmbedderConfig::new("http://localhost:8080");
        config.batch_size = 0;
        assert!(HttpEmbedder::new(config).is_err());
    }

    #[test]
    fn response_is_reordered_by_index() -> Result<(), Box<dyn std::error::Error>> {
        let payload: EmbeddingResponse = serde_json::from_str(
            r#"{"data":[{"embedding":[0.0,1.0],"index":1},{"embedding":[1.0,0.0],"index":0}]}"#,
        )?;

        let vectors = vectors_in_input_order(payload, 2, None)?;

        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        Ok(())
    }

    #[test]
    fn response_with_wrong_count_or_width_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let short: EmbeddingResponse =
            serde_json::from_str(r#"{"data":[{"embedding":[1.0],"index":0}]}"#)?;
        assert!(vectors_in_input_order(short, 2, None).is_err());

        let ragged: EmbeddingResponse = serde_json::from_str(
            r#"{"data":[{"embedding":[1.0,0.0],"index":0},{"embedding":[1.0],"index":1}]}"#,
        )?;
        assert!(vectors_in_input_order(ragged, 2, None).is_err());
        Ok(())
    }
}
