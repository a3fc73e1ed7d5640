//! Text embedding client for the semantic matching strategy
//!
//! Thin wrapper over an OpenAI-compatible embeddings endpoint. The model is
//! a black box: text in, fixed-dimension vector out.

use crate::config::EmbeddingConfig;
use crate::{Error, Result};

/// Produces dense embedding vectors via an external embeddings API
#[derive(Debug, Clone)]
pub struct Embedder {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl Embedder {
    /// Create an embedder from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if no API key is configured
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| Error::Config("embedding API key required for semantic matching".to_string()))?;

        Ok(Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
        })
    }

    /// Model identifier, used in the strategy's cache identity
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Generate an embedding for a single text
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self.embed_batch(&[text]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("empty embedding response".to_string()))
    }

    /// Generate embeddings for multiple texts, preserving input order
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails
    pub async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        #[derive(serde::Serialize)]
        struct EmbeddingRequest<'a> {
            model: &'a str,
            input: &'a [&'a str],
        }

        #[derive(serde::Deserialize)]
        struct EmbeddingResponse {
            data: Vec<EmbeddingData>,
        }

        #[derive(serde::Deserialize)]
        struct EmbeddingData {
            embedding: Vec<f32>,
            index: usize,
        }

        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Embedding(format!("embedding API error {status}: {body}")));
        }

        let mut result: EmbeddingResponse = response.json().await?;

        // Sort by index to maintain input order
        result.data.sort_by_key(|d| d.index);

        Ok(result.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_api_key_rejected() {
        let config = EmbeddingConfig {
            api_key: None,
            ..EmbeddingConfig::default()
        };
        assert!(Embedder::new(&config).is_err());
    }

    #[test]
    fn trailing_slash_trimmed() {
        let config = EmbeddingConfig {
            base_url: "https://api.example.com/v1/".to_string(),
            api_key: Some("key".to_string()),
            ..EmbeddingConfig::default()
        };
        let embedder = Embedder::new(&config).unwrap();
        assert_eq!(embedder.base_url, "https://api.example.com/v1");
    }
}
