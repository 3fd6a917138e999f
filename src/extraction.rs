//! Image text extraction via a hosted vision model.
//!
//! Defines the [`Extractor`] trait and its OpenAI implementation,
//! [`OpenAiExtractor`], which calls the chat-completions endpoint with the
//! image inlined as a base64 data URL.
//!
//! The model's reply is returned verbatim. When an image holds no text the
//! model is instructed to answer [`NO_TEXT_REPLY`], which callers treat as
//! ordinary text.
//!
//! There is no retry: a failed call surfaces as an [`ExtractionError`] and
//! the user re-triggers it. The client timeout from
//! [`ExtractionConfig::timeout_secs`] is the only latency bound.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use std::path::Path;
use std::time::Duration;

use crate::config::ExtractionConfig;
use crate::error::{ConfigError, ExtractionError};

/// Reply the model is asked to give when an image holds no text.
pub const NO_TEXT_REPLY: &str = "No text found.";

const SYSTEM_PROMPT: &str = "You are an OCR specialist who extracts text from images with high accuracy. \
Return every piece of text contained in the image exactly as written. \
You read both English and Korean accurately. \
Preserve the original layout and line breaks as closely as possible. \
If the image contains no text, reply with exactly: No text found.";

const USER_PROMPT: &str =
    "Extract all text from this image. Return only the text, with no other explanation.";

/// Fallback when a caller has no better idea of the image type.
pub const DEFAULT_MIME_TYPE: &str = "image/jpeg";

/// Turns image bytes into text.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, image: &[u8], mime_type: &str) -> Result<String, ExtractionError>;
}

/// Whether `mime_type` is one of the raster formats the model is sent.
pub fn is_supported_mime_type(mime_type: &str) -> bool {
    matches!(
        mime_type,
        "image/jpeg" | "image/png" | "image/gif" | "image/bmp" | "image/webp"
    )
}

/// MIME type for an image path, by extension.
///
/// Returns `None` for extensions that are not supported raster formats.
pub fn mime_type_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// Extractor backed by the OpenAI chat-completions API.
pub struct OpenAiExtractor {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_completion_tokens: u32,
}

impl OpenAiExtractor {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// [`ConfigError::MissingApiKey`] when no key was supplied; callers treat
    /// this as "extraction disabled".
    pub fn new(config: &ExtractionConfig) -> Result<Self, ConfigError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|_| config.is_enabled())
            .ok_or_else(|| ConfigError::MissingApiKey(config.api_key_env.clone()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ConfigError::Invalid(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            max_completion_tokens: config.max_completion_tokens,
        })
    }

    fn request_body(&self, image: &[u8], mime_type: &str) -> serde_json::Value {
        let data_url = format!("data:{};base64,{}", mime_type, STANDARD.encode(image));
        serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                {
                    "role": "user",
                    "content": [
                        { "type": "text", "text": USER_PROMPT },
                        { "type": "image_url", "image_url": { "url": data_url } }
                    ]
                }
            ],
            "max_completion_tokens": self.max_completion_tokens,
        })
    }
}

#[async_trait]
impl Extractor for OpenAiExtractor {
    async fn extract(&self, image: &[u8], mime_type: &str) -> Result<String, ExtractionError> {
        if image.is_empty() {
            return Err(ExtractionError::Input("image is empty".to_string()));
        }
        let mime_type = if mime_type.trim().is_empty() {
            DEFAULT_MIME_TYPE
        } else {
            mime_type
        };

        tracing::debug!(model = %self.model, bytes = image.len(), mime_type, "requesting extraction");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(image, mime_type))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "extraction API returned an error");
            return Err(ExtractionError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ExtractionError::MalformedResponse(e.to_string()))?;
        parse_completion(&json)
    }
}

/// Pull `choices[0].message.content` out of a chat-completions reply.
fn parse_completion(json: &serde_json::Value) -> Result<String, ExtractionError> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            ExtractionError::MalformedResponse(
                "missing choices[0].message.content".to_string(),
            )
        })
}
