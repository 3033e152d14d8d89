//! Groq chat-completions client (OpenAI-compatible API).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{DEFAULT_GROQ_MODEL, GROQ_API_URL};
use crate::orchestrator::LanguageModel;
use crate::{Error, Result};

/// Sampling temperature for every completion; answers must be reproducible.
pub const MODEL_TEMPERATURE: f32 = 0.0;

/// Per-request timeout for completions.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Groq client.
#[derive(Debug, Clone)]
pub struct GroqClient {
    http: Client,
    api_key: String,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl GroqClient {
    /// Create client with API key, default model and endpoint.
    pub fn new<S: Into<String>>(api_key: S) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::Configuration("GROQ_API_KEY is empty".to_string()));
        }

        let http = Client::builder()
            .user_agent(concat!("krishi_ai/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::ModelInvocation(format!("HTTP client error: {}", e)))?;

        Ok(Self {
            http,
            api_key,
            base_url: GROQ_API_URL.to_string(),
            model: DEFAULT_GROQ_MODEL.to_string(),
            timeout: REQUEST_TIMEOUT,
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Chat completion.
    pub async fn chat_completion(&self, messages: Vec<ChatMessage>) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages,
            temperature: MODEL_TEMPERATURE,
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::ModelInvocation(format!("Groq request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::ModelInvocation(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(Error::ModelInvocation(format!(
                "Groq error {}: {}",
                status, text
            )));
        }

        let chat_response: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| Error::ModelInvocation(format!("Invalid response: {}", e)))?;

        debug!(model = %self.model, "Received completion");

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::ModelInvocation("Empty response from Groq".to_string()))
    }
}

#[async_trait]
impl LanguageModel for GroqClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.chat_completion(vec![ChatMessage::user(prompt)]).await
    }
}

/// Chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: Some(content.into()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}
