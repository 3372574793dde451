//! Generative text endpoint client.
//!
//! [`GenerativeModel`] is the seam the answer service talks to;
//! [`GeminiClient`] implements it against Google's Generative Language API
//! (`generateContent`, non-streaming).

mod wire;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};

use kbchat_shared::{GeminiConfig, KbChatError, Result};

use crate::wire::{Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, Part};

/// User-Agent string for model requests.
const USER_AGENT: &str = concat!("kbchat/", env!("CARGO_PKG_VERSION"));

/// Longest error body echoed back into an error message.
const MAX_ERROR_BODY: usize = 500;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Sampling parameters forwarded as `generationConfig`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            top_p: 0.8,
            top_k: 10,
        }
    }
}

impl From<&GeminiConfig> for SamplingParams {
    fn from(config: &GeminiConfig) -> Self {
        Self {
            temperature: config.temperature,
            top_p: config.top_p,
            top_k: config.top_k,
        }
    }
}

/// A single-turn generation request.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// Model identifier, e.g. `gemini-2.5-flash`.
    pub model: String,
    /// System instruction (persona and rules).
    pub system_instruction: String,
    /// The user-turn text.
    pub contents: String,
    pub sampling: SamplingParams,
}

// ---------------------------------------------------------------------------
// GenerativeModel
// ---------------------------------------------------------------------------

/// A hosted model that turns a prompt into text.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Provider name for logs.
    fn name(&self) -> &str;

    /// Run one generation and return the reply text.
    async fn generate(&self, req: &GenerateRequest) -> Result<String>;
}

// ---------------------------------------------------------------------------
// GeminiClient
// ---------------------------------------------------------------------------

/// Connection settings for [`GeminiClient`].
#[derive(Debug, Clone)]
pub struct GeminiOptions {
    pub api_key: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl GeminiOptions {
    /// Options from config plus an already-resolved API key.
    pub fn from_config(config: &GeminiConfig, api_key: String) -> Self {
        Self {
            api_key,
            base_url: config.base_url.clone(),
            timeout_secs: config.timeout_secs,
        }
    }
}

/// Google Gemini `generateContent` client.
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(opts: GeminiOptions) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(opts.timeout_secs))
            .build()
            .map_err(|e| KbChatError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: opts.api_key,
            base_url: opts.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{model}:generateContent", self.base_url)
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    #[instrument(skip_all, fields(model = %req.model, contents_len = req.contents.len()))]
    async fn generate(&self, req: &GenerateRequest) -> Result<String> {
        let url = self.endpoint(&req.model);
        let body = GenerateContentRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part::text(&req.system_instruction)],
            },
            contents: vec![Content {
                role: Some("user".into()),
                parts: vec![Part::text(&req.contents)],
            }],
            generation_config: GenerationConfig {
                temperature: req.sampling.temperature,
                top_p: req.sampling.top_p,
                top_k: req.sampling.top_k,
            },
        };

        debug!("sending Gemini request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| KbChatError::Network(format!("Gemini request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let snippet: String = text.chars().take(MAX_ERROR_BODY).collect();
            return Err(KbChatError::Model(format!("Gemini error {status}: {snippet}")));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| KbChatError::Model(format!("invalid Gemini response: {e}")))?;

        let text = parsed.text();
        if text.trim().is_empty() {
            let reason = parsed
                .finish_reason()
                .unwrap_or("no candidates")
                .to_string();
            return Err(KbChatError::Model(format!("empty reply ({reason})")));
        }

        debug!(reply_len = text.len(), "Gemini reply received");
        Ok(text)
    }
}

/// Stands in for a model whose credentials are missing.
///
/// Every call fails with a config error, so callers degrade the same way
/// they do for any other model failure.
pub struct UnconfiguredModel {
    reason: String,
}

impl UnconfiguredModel {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl GenerativeModel for UnconfiguredModel {
    fn name(&self) -> &str {
        "unconfigured"
    }

    async fn generate(&self, _req: &GenerateRequest) -> Result<String> {
        Err(KbChatError::config(self.reason.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> GeminiClient {
        GeminiClient::new(GeminiOptions {
            api_key: "test-key".into(),
            base_url: server.uri(),
            timeout_secs: 5,
        })
        .expect("build client")
    }

    fn request() -> GenerateRequest {
        GenerateRequest {
            model: "gemini-2.5-flash".into(),
            system_instruction: "be nice".into(),
            contents: "what are the hours?".into(),
            sampling: SamplingParams::default(),
        }
    }

    #[tokio::test]
    async fn generate_sends_expected_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_partial_json(serde_json::json!({
                "systemInstruction": { "parts": [{ "text": "be nice" }] },
                "contents": [{ "role": "user", "parts": [{ "text": "what are the hours?" }] }],
                "generationConfig": { "topK": 10 }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{
                    "content": { "role": "model", "parts": [{ "text": "9-6" }, { "text": " daily" }] },
                    "finishReason": "STOP"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = client_for(&server).generate(&request()).await.expect("generate");
        assert_eq!(reply, "9-6 daily");
    }

    #[tokio::test]
    async fn http_error_is_model_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .generate(&request())
            .await
            .expect_err("429 should fail");
        let msg = err.to_string();
        assert!(msg.contains("429"));
        assert!(msg.contains("quota exceeded"));
    }

    #[tokio::test]
    async fn empty_candidates_is_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{ "finishReason": "SAFETY" }]
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .generate(&request())
            .await
            .expect_err("empty reply");
        assert!(err.to_string().contains("SAFETY"));
    }

    #[tokio::test]
    async fn malformed_json_is_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client_for(&server).generate(&request()).await.expect_err("bad json");
        assert!(err.to_string().contains("invalid Gemini response"));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_network_error() {
        let client = GeminiClient::new(GeminiOptions {
            api_key: "k".into(),
            base_url: "http://127.0.0.1:9".into(),
            timeout_secs: 2,
        })
        .unwrap();

        let err = client.generate(&request()).await.expect_err("connection refused");
        assert!(matches!(err, KbChatError::Network(_)));
    }

    #[test]
    fn endpoint_trims_trailing_slash() {
        let client = GeminiClient::new(GeminiOptions {
            api_key: "k".into(),
            base_url: "https://example.com/".into(),
            timeout_secs: 1,
        })
        .unwrap();
        assert_eq!(
            client.endpoint("m"),
            "https://example.com/v1beta/models/m:generateContent"
        );
    }

    #[tokio::test]
    async fn unconfigured_model_always_fails_with_config_error() {
        let model = UnconfiguredModel::new("GEMINI_API_KEY is not set");
        let err = model.generate(&request()).await.expect_err("no credentials");
        assert!(matches!(err, KbChatError::Config { .. }));
        assert!(err.to_string().contains("GEMINI_API_KEY"));
    }

    #[test]
    fn sampling_from_config() {
        let config = GeminiConfig::default();
        let sampling = SamplingParams::from(&config);
        assert_eq!(sampling, SamplingParams::default());
    }
}
