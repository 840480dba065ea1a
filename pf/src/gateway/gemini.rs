//! Gemini REST client implementation
//!
//! Implements the ReasoningClient trait against the generateContent endpoint.
//! One call here is one HTTP round-trip; transient-failure retries happen in
//! [`super::invoke_with_retry`].

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::{ConfigSnapshot, ProviderConfig};

use super::types::{DocumentRef, MediaResolution, extract_json};
use super::{ClientFactory, GatewayError, InvokeRequest, ReasoningClient};

const API_VERSION: &str = "v1beta";

/// Fallback wait when the provider rate-limits without a retry-after header
const DEFAULT_RATE_LIMIT_WAIT_SECS: u64 = 30;

/// Gemini generateContent client
pub struct GeminiClient {
    model: String,
    api_key: String,
    base_url: String,
    http: Client,
    timeout: Duration,
}

impl GeminiClient {
    /// Create a client for one pipeline from provider config and the
    /// snapshot-resolved API key.
    pub fn new(config: &ProviderConfig, api_key: String) -> Result<Self, GatewayError> {
        let timeout = Duration::from_millis(config.timeout_ms);
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(GatewayError::Network)?;
        Ok(Self {
            model: config.model.clone(),
            api_key,
            base_url: config.base_url.clone(),
            http,
            timeout,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/{}/models/{}:generateContent",
            self.base_url, API_VERSION, self.model
        )
    }

    /// Build the request body for the generateContent API
    fn build_request_body(&self, request: &InvokeRequest) -> Value {
        debug!(%self.model, capability = %request.capability, "build_request_body: called");
        let mut parts = vec![json!({ "text": request.instructions })];
        if let Some(text) = &request.text {
            parts.push(json!({ "text": text }));
        }
        for document in &request.documents {
            let mut part = json!({
                "inline_data": {
                    "mime_type": document.mime_type,
                    "data": BASE64.encode(&document.bytes),
                }
            });
            if let Some(level) = request
                .tuning
                .media_resolution
                .or_else(|| default_resolution(document))
            {
                part["media_resolution"] = json!({ "level": level.wire_name() });
            }
            parts.push(part);
        }

        // Tuning fields are only sent when explicitly set, so the provider's
        // own defaults apply otherwise.
        let mut generation = json!({ "response_mime_type": "application/json" });
        if let Some(temperature) = request.tuning.temperature {
            generation["temperature"] = json!(temperature);
        }
        if let Some(top_p) = request.tuning.top_p {
            generation["top_p"] = json!(top_p);
        }

        json!({
            "contents": [{ "role": "user", "parts": parts }],
            "generation_config": generation,
        })
    }

    fn classify_status(status: u16, message: String) -> GatewayError {
        match status {
            401 | 403 => GatewayError::Auth(message),
            _ => GatewayError::Api { status, message },
        }
    }
}

/// Document resolution defaults: drawings need detail, PDFs are usually text
fn default_resolution(document: &DocumentRef) -> Option<MediaResolution> {
    if document.is_image() {
        Some(MediaResolution::High)
    } else if document.is_pdf() {
        Some(MediaResolution::Medium)
    } else {
        None
    }
}

#[async_trait]
impl ReasoningClient for GeminiClient {
    async fn invoke(&self, request: InvokeRequest) -> Result<Value, GatewayError> {
        debug!(
            capability = %request.capability,
            documents = request.documents.len(),
            "invoke: calling provider"
        );
        let body = self.build_request_body(&request);

        let response = match self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.clone())
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return Err(GatewayError::Timeout(self.timeout)),
            Err(e) => return Err(GatewayError::Network(e)),
        };

        let status = response.status().as_u16();
        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(DEFAULT_RATE_LIMIT_WAIT_SECS);
            return Err(GatewayError::RateLimited {
                retry_after: Duration::from_secs(retry_after),
            });
        }
        if !response.status().is_success() {
            let message = response.text().await.unwrap_or_default();
            debug!(status, "invoke: provider error");
            return Err(Self::classify_status(status, message));
        }

        let api_response: GenerateContentResponse = response.json().await?;

        if let Some(feedback) = &api_response.prompt_feedback
            && let Some(reason) = &feedback.block_reason
        {
            return Err(GatewayError::ContentPolicy(reason.clone()));
        }

        let candidate = api_response.candidates.into_iter().next().ok_or_else(|| {
            GatewayError::Api {
                status,
                message: "provider returned no candidates".to_string(),
            }
        })?;

        if candidate.finish_reason.as_deref() == Some("SAFETY") {
            return Err(GatewayError::ContentPolicy(
                "candidate blocked by safety filter".to_string(),
            ));
        }

        let text = candidate
            .content
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        debug!(chars = text.len(), "invoke: provider reply received");

        // The reply is untrusted text; pull out whatever structure it holds
        // and let the normalizer decide if it is usable.
        Ok(extract_json(&text))
    }
}

/// Builds one GeminiClient per pipeline invocation
pub struct GeminiFactory {
    provider: ProviderConfig,
}

impl GeminiFactory {
    pub fn new(provider: ProviderConfig) -> Self {
        Self { provider }
    }
}

impl ClientFactory for GeminiFactory {
    fn create(&self, snapshot: &ConfigSnapshot) -> Result<Arc<dyn ReasoningClient>, GatewayError> {
        Ok(Arc::new(GeminiClient::new(&self.provider, snapshot.api_key.clone())?))
    }
}

// Gemini API response types

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}
