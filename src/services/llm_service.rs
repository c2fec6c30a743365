use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::LlmError;

/// Configuration for LLM service
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub enabled: bool,
    pub provider: String,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: "ollama".to_string(),
            base_url: "http://localhost:11434".to_string(),
            model: "mistral".to_string(),
            timeout_secs: 30,
            max_tokens: 300,
            temperature: 0.2,
        }
    }
}

/// Sampling parameters passed with each prompt
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Trait for text generation backends
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a completion from a prompt
    async fn generate(&self, prompt: &str, params: GenerationParams) -> Result<String, LlmError>;

    /// Cheap reachability check used by the health route
    async fn is_available(&self) -> bool;
}

/// Ollama API request/response structures
#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    #[serde(default)]
    eval_count: Option<u32>,
}

/// Ollama provider implementation
pub struct OllamaProvider {
    base_url: String,
    model: String,
    client: Client,
}

impl OllamaProvider {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build LLM HTTP client ({}), using defaults", e);
                Client::new()
            });

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
        }
    }
}

#[async_trait]
impl TextGenerator for OllamaProvider {
    async fn generate(&self, prompt: &str, params: GenerationParams) -> Result<String, LlmError> {
        debug!("Generating LLM completion (model: {}, max_tokens: {})", self.model, params.max_tokens);

        let request = OllamaRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: OllamaOptions {
                temperature: params.temperature,
                num_predict: params.max_tokens,
            },
        };

        let response = self.client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::NetworkError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LlmError::ApiError(format!("HTTP {}: {}", status, error_text)));
        }

        let body = response.json::<OllamaResponse>()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        if let Some(tokens) = body.eval_count {
            debug!("LLM completion generated ({} tokens)", tokens);
        }

        Ok(body.response.trim().to_string())
    }

    async fn is_available(&self) -> bool {
        let tags = self.client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(Duration::from_secs(2))
            .send()
            .await;

        match tags {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!("Ollama reachability check failed: {}", e);
                false
            }
        }
    }
}

/// LLM service with an optional provider.
///
/// A disabled service is a normal mode of operation: every call returns
/// [`LlmError::Disabled`] and callers fall back to deterministic behavior.
pub struct LlmService {
    config: LlmConfig,
    provider: Option<Arc<dyn TextGenerator>>,
}

impl LlmService {
    pub fn new(config: LlmConfig) -> Self {
        let provider = if config.enabled {
            info!("Initializing LLM service with provider: {}", config.provider);
            match config.provider.as_str() {
                "ollama" => {
                    let provider = OllamaProvider::new(
                        &config.base_url,
                        &config.model,
                        Duration::from_secs(config.timeout_secs),
                    );
                    Some(Arc::new(provider) as Arc<dyn TextGenerator>)
                },
                _ => {
                    warn!("Unknown LLM provider: {}. LLM features disabled.", config.provider);
                    None
                }
            }
        } else {
            info!("LLM features are disabled in configuration");
            None
        };

        Self { config, provider }
    }

    /// Build a service around an existing generator, regardless of `config.enabled`.
    pub fn with_provider(config: LlmConfig, provider: Arc<dyn TextGenerator>) -> Self {
        Self {
            config,
            provider: Some(provider),
        }
    }

    pub fn disabled() -> Self {
        Self {
            config: LlmConfig::default(),
            provider: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.provider.is_some()
    }

    pub fn default_params(&self) -> GenerationParams {
        GenerationParams {
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        }
    }

    /// One generation attempt, bounded by the configured timeout. No retries.
    pub async fn generate(&self, prompt: &str, params: GenerationParams) -> Result<String, LlmError> {
        let provider = self.provider.as_ref()
            .ok_or(LlmError::Disabled)?;

        let timeout = Duration::from_secs(self.config.timeout_secs);
        match tokio::time::timeout(timeout, provider.generate(prompt, params)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("LLM call exceeded {}s", self.config.timeout_secs);
                Err(LlmError::Timeout)
            }
        }
    }

    pub async fn is_available(&self) -> bool {
        match &self.provider {
            Some(provider) => provider.is_available().await,
            None => false,
        }
    }
}
