//! Ollama client for local text embeddings.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{DEFAULT_EMBEDDING_MODEL, OLLAMA_URL};
use crate::orchestrator::Embedder;
use crate::{Error, Result};

/// Ollama client bound to one embedding model.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    /// Create client with default URL and model.
    pub fn new() -> Result<Self> {
        Self::with_url(OLLAMA_URL, DEFAULT_EMBEDDING_MODEL)
    }

    /// Create client with custom URL and embedding model.
    pub fn with_url(base_url: &str, model: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| Error::Embedding(format!("HTTP client error: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Check if Ollama server is running.
    pub async fn is_running(&self) -> bool {
        self.http
            .get(format!("{}/api/tags", self.base_url))
            .timeout(Duration::from_secs(2))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    /// List available models.
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let response = self
            .http
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
            .map_err(|e| Error::Embedding(format!("Ollama request failed: {}", e)))?;

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| Error::Embedding(format!("Invalid response: {}", e)))?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Whether the configured embedding model has been pulled.
    ///
    /// Ollama reports untagged names with an implicit `:latest`.
    pub async fn has_model(&self) -> Result<bool> {
        let wanted = with_default_tag(&self.model);
        Ok(self
            .list_models()
            .await?
            .iter()
            .any(|name| with_default_tag(name) == wanted))
    }

    /// Embed a single text.
    pub async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::Embedding("cannot embed empty text".to_string()));
        }

        let request = EmbedRequest {
            model: self.model.clone(),
            input: text.to_string(),
        };

        let response = self
            .http
            .post(format!("{}/api/embed", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Embedding(format!("Ollama request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Embedding(format!("Ollama error {}: {}", status, text)));
        }

        let result: EmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::Embedding(format!("Invalid response: {}", e)))?;

        let embedding = result
            .embeddings
            .into_iter()
            .next()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::Embedding("No embedding returned".to_string()))?;

        debug!(model = %self.model, dimension = embedding.len(), "Embedded query");
        Ok(embedding)
    }
}

#[async_trait]
impl Embedder for OllamaClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_text(text).await
    }
}

fn with_default_tag(name: &str) -> String {
    if name.contains(':') {
        name.to_string()
    } else {
        format!("{}:latest", name)
    }
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    models: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
struct ModelInfo {
    name: String,
}

#[derive(Debug, Serialize)]
struct EmbedRequest {
    model: String,
    input: String,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}
