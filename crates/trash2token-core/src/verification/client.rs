//! ============================================================================
//! Verification Client - Vision model calls via the Gemini API
//! ============================================================================
//! The model sits behind the `VisionModel` trait so callers construct one
//! client at startup and inject it. `VerificationClient` adds the single
//! bounded attempt: no retries, timeout maps to a network failure.
//! ============================================================================

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::prompt::VerificationRequest;
use super::VerificationError;

/// Gemini REST endpoint base
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default multimodal model
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// How long a verification may take before it counts as failed
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// A multimodal model that answers a prompt about one image with free text.
#[async_trait]
pub trait VisionModel: Send + Sync {
    async fn generate(&self, request: &VerificationRequest) -> Result<String, VerificationError>;

    fn name(&self) -> &str;
}

/// Gemini `generateContent` client
pub struct GeminiVisionClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiVisionClient {
    pub fn new(api_key: String) -> Self {
        Self::new_custom(api_key, GEMINI_API_BASE.to_string(), DEFAULT_MODEL.to_string())
    }

    /// Create with custom base URL and model
    pub fn new_custom(api_key: String, base_url: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        }
    }
}

#[async_trait]
impl VisionModel for GeminiVisionClient {
    async fn generate(&self, request: &VerificationRequest) -> Result<String, VerificationError> {
        debug!(
            "Calling {} with {} chars and a {} byte {} image",
            self.model,
            request.prompt.len(),
            request.image.size,
            request.image.mime_type
        );

        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text {
                        text: request.prompt.clone(),
                    },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: request.image.mime_type.clone(),
                            data: request.image.data.clone(),
                        },
                    },
                ],
            }],
        };

        let response = self
            .client
            .post(format!("{}/models/{}:generateContent", self.base_url, self.model))
            .header("x-goog-api-key", self.api_key.as_str())
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                VerificationError::NetworkFailure(format!("Failed to call model API: {}", e.without_url()))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(VerificationError::NetworkFailure(format!(
                "Model API error {}: {}",
                status, body
            )));
        }

        let parsed: GenerateResponse = response.json().await.map_err(|e| {
            VerificationError::MalformedResponse(format!("Failed to parse model envelope: {}", e))
        })?;

        // Concatenate the text parts of the first candidate
        Ok(parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default())
    }

    fn name(&self) -> &str {
        &self.model
    }
}

/// Single-attempt, time-bounded access to a vision model.
#[derive(Clone)]
pub struct VerificationClient {
    model: Arc<dyn VisionModel>,
    timeout: Duration,
}

impl VerificationClient {
    pub fn new(model: Arc<dyn VisionModel>, timeout: Duration) -> Self {
        Self { model, timeout }
    }

    /// Send the request once. Returns the raw model text.
    pub async fn request(&self, request: &VerificationRequest) -> Result<String, VerificationError> {
        info!("Requesting {:?} verification from {}", request.kind, self.model.name());

        let text = match tokio::time::timeout(self.timeout, self.model.generate(request)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!("Verification timed out after {:?}", self.timeout);
                return Err(VerificationError::NetworkFailure(format!(
                    "Model API request timed out after {}s",
                    self.timeout.as_secs_f32()
                )));
            }
        };

        if text.trim().is_empty() {
            return Err(VerificationError::MalformedResponse("Model returned no text".into()));
        }

        debug!("Raw model response: {}", text);
        Ok(text)
    }
}

// ============================================================================
// Gemini API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
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
