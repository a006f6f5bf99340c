// AI Provider Service
// Gemini generateContent client with retry, backoff and a prompt-keyed response cache

use crate::services::config_store::SemanticConfig;
use crate::services::response_cache::{ResponseCache, DEFAULT_SWEEP_INTERVAL};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },
    #[error("Rate limited by provider")]
    RateLimited,
    #[error("Request timed out after {0}s")]
    Timeout(u64),
    #[error("Content blocked by safety filters")]
    ContentBlocked,
    #[error("Missing content in response")]
    MissingContent,
    #[error("JSON parse error: {0}")]
    JsonError(String),
    #[error("API key not configured")]
    MissingApiKey,
}

impl ProviderError {
    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::RateLimited | ProviderError::Timeout(_) => true,
            ProviderError::HttpError(e) => e.is_timeout() || e.is_connect(),
            ProviderError::ApiError { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Clone, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    max_output_tokens: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Clone, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: u16,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResult {
    pub content: String,
    pub latency_ms: i64,
    pub from_cache: bool,
}

pub struct GeminiClient {
    client: Client,
    config: SemanticConfig,
    api_key: String,
    cache: Option<Arc<ResponseCache<String>>>,
}

impl GeminiClient {
    /// Builds a client from validated settings. The cache sweeper needs a Tokio runtime.
    pub fn new(config: SemanticConfig) -> Result<Self, ProviderError> {
        let api_key = config
            .api_key()
            .map(str::to_string)
            .ok_or(ProviderError::MissingApiKey)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;

        let cache = config.cache.enabled.then(|| {
            let cache = Arc::new(ResponseCache::new(&config.cache));
            if tokio::runtime::Handle::try_current().is_ok() {
                ResponseCache::spawn_sweeper(&cache, DEFAULT_SWEEP_INTERVAL);
            }
            cache
        });

        info!(
            "[PROVIDER] Gemini client ready model={} cache={}",
            config.model,
            cache.is_some()
        );
        Ok(Self {
            client,
            config,
            api_key,
            cache,
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    pub fn cache(&self) -> Option<&Arc<ResponseCache<String>>> {
        self.cache.as_ref()
    }

    fn url(&self) -> String {
        build_generate_url(&self.config.endpoint, &self.config.model, &self.api_key)
    }

    /// Sends `prompt`, retrying transient failures with exponential backoff.
    pub async fn generate_content(&self, prompt: &str) -> Result<ChatResult, ProviderError> {
        if let Some(cached) = self.cache.as_ref().and_then(|c| c.get(prompt)) {
            debug!("[PROVIDER] cache hit ({} chars)", cached.len());
            return Ok(ChatResult {
                content: cached,
                latency_ms: 0,
                from_cache: true,
            });
        }

        let max_attempts = self.config.retry.max_attempts.max(1);
        let timeout_secs = self.config.timeout_secs.max(1);
        let mut last_err = ProviderError::MissingContent;

        for attempt in 1..=max_attempts {
            let start = Instant::now();
            let res = tokio::time::timeout(Duration::from_secs(timeout_secs), self.send(prompt)).await;

            match res {
                Ok(Ok(content)) => {
                    let latency_ms = start.elapsed().as_millis() as i64;
                    info!(
                        "[PROVIDER] Gemini ok model={} attempt={} latency_ms={}",
                        self.config.model, attempt, latency_ms
                    );
                    if let Some(cache) = &self.cache {
                        cache.set(prompt, content.clone());
                    }
                    return Ok(ChatResult {
                        content,
                        latency_ms,
                        from_cache: false,
                    });
                }
                Ok(Err(e)) => {
                    warn!(
                        "[PROVIDER] Gemini error model={} attempt={} : {}",
                        self.config.model, attempt, e
                    );
                    last_err = e;
                }
                Err(_) => {
                    warn!(
                        "[PROVIDER] Gemini timeout model={} attempt={} ({}s)",
                        self.config.model, attempt, timeout_secs
                    );
                    last_err = ProviderError::Timeout(timeout_secs);
                }
            }

            if !last_err.is_retryable() {
                break;
            }
            if attempt < max_attempts {
                let backoff_ms = self.config.retry.backoff_ms(attempt);
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            }
        }

        Err(last_err)
    }

    async fn send(&self, prompt: &str) -> Result<String, ProviderError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
                max_output_tokens: self.config.max_tokens,
            },
        };

        let response = self
            .client
            .post(self.url())
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited);
        }
        if !status.is_success() {
            let message = serde_json::from_str::<GenerateContentResponse>(&body)
                .ok()
                .and_then(|r| r.error)
                .map(|e| e.message)
                .unwrap_or(body);
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        parse_generate_response(&body)
    }
}

pub fn build_generate_url(endpoint: &str, model: &str, api_key: &str) -> String {
    format!(
        "{}/models/{}:generateContent?key={}",
        endpoint.trim_end_matches('/'),
        model,
        api_key
    )
}

/// Concatenated text of the first candidate.
fn parse_generate_response(body: &str) -> Result<String, ProviderError> {
    let parsed: GenerateContentResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::JsonError(e.to_string()))?;

    if let Some(err) = parsed.error {
        return Err(ProviderError::ApiError {
            status: err.code,
            message: err.message,
        });
    }
    if parsed
        .prompt_feedback
        .as_ref()
        .and_then(|f| f.block_reason.as_ref())
        .is_some()
    {
        return Err(ProviderError::ContentBlocked);
    }

    let candidate = parsed.candidates.into_iter().next().ok_or(ProviderError::MissingContent)?;
    if candidate.finish_reason.as_deref() == Some("SAFETY") {
        return Err(ProviderError::ContentBlocked);
    }

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    if text.trim().is_empty() {
        return Err(ProviderError::MissingContent);
    }
    Ok(text)
}
