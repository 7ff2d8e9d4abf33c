//! Gemini (Google) image editing client.

use crate::error::{parse_retry_after, sanitize_error_message, PlatesError, Result};
use crate::image::provider::ImageGenerator;
use crate::image::types::{DataUrl, EditRequest};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Name used when wrapping failures of this backend.
const BACKEND: &str = "Gemini API";

/// Gemini image model variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GeminiModel {
    /// Nano Banana - Gemini 2.5 Flash Image.
    #[default]
    NanoBanana,
    /// The preview release of Gemini 2.5 Flash Image.
    NanoBananaPreview,
}

impl GeminiModel {
    /// Returns the API model identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NanoBanana => "gemini-2.5-flash-image",
            Self::NanoBananaPreview => "gemini-2.5-flash-image-preview",
        }
    }
}

/// Builder for GeminiClient.
#[derive(Debug, Clone, Default)]
pub struct GeminiClientBuilder {
    api_key: Option<String>,
    model: GeminiModel,
    base_url: Option<String>,
}

impl GeminiClientBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to `GOOGLE_API_KEY`, then `API_KEY`.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the Gemini model variant.
    pub fn model(mut self, model: GeminiModel) -> Self {
        self.model = model;
        self
    }

    /// Overrides the API base URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Builds the client, resolving the API key.
    pub fn build(self) -> Result<GeminiClient> {
        let api_key = self
            .api_key
            .or_else(|| std::env::var("GOOGLE_API_KEY").ok())
            .or_else(|| std::env::var("API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                PlatesError::Auth("GOOGLE_API_KEY (or API_KEY) not set and no API key provided".into())
            })?;

        Ok(GeminiClient {
            client: reqwest::Client::new(),
            api_key,
            model: self.model,
            base_url: self
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        })
    }
}

/// Gemini image editing client.
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    model: GeminiModel,
    base_url: String,
}

impl GeminiClient {
    /// Creates a new `GeminiClientBuilder`.
    pub fn builder() -> GeminiClientBuilder {
        GeminiClientBuilder::new()
    }

    /// The model this client talks to.
    pub fn model(&self) -> GeminiModel {
        self.model
    }

    async fn generate_impl(&self, request: &EditRequest<'_>) -> Result<Option<DataUrl>> {
        let start = Instant::now();

        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url,
            self.model.as_str(),
        );

        let body = GeminiRequest::from_edit_request(request);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(parse_error(status.as_u16(), &text, &headers));
        }

        let gemini_response: GeminiResponse = response.json().await?;
        let image = first_inline_image(gemini_response);

        tracing::debug!(
            model = self.model.as_str(),
            duration_ms = start.elapsed().as_millis() as u64,
            found = image.is_some(),
            "Gemini generation complete"
        );

        Ok(image)
    }
}

#[async_trait]
impl ImageGenerator for GeminiClient {
    async fn generate(&self, request: &EditRequest<'_>) -> Result<Option<DataUrl>> {
        self.generate_impl(request).await.map_err(|e| {
            tracing::error!(model = self.model.as_str(), "error calling Gemini API: {e}");
            PlatesError::generation(BACKEND, e)
        })
    }

    fn name(&self) -> &str {
        "Gemini (Google)"
    }

    async fn health_check(&self) -> Result<()> {
        let url = format!("{}/models/{}", self.base_url, self.model.as_str());

        let response = self
            .client
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await?;

        match response.status().as_u16() {
            401 | 403 => Err(PlatesError::Auth("Invalid API key".into())),
            404 => Err(PlatesError::InvalidRequest(
                "Model not found. Verify the model name is correct.".into(),
            )),
            s if !(200..300).contains(&s) => Err(PlatesError::Api {
                status: s,
                message: "Health check failed".into(),
            }),
            _ => Ok(()),
        }
    }
}

fn parse_error(status: u16, text: &str, headers: &reqwest::header::HeaderMap) -> PlatesError {
    let text = sanitize_error_message(text);
    match status {
        402 => {
            return PlatesError::Billing(
                "Gemini billing issue: enable billing at https://aistudio.google.com".into(),
            )
        }
        404 => {
            return PlatesError::InvalidRequest(
                "Model not found. Verify the model name is correct.".into(),
            )
        }
        429 => {
            let retry_after = parse_retry_after(headers).map(std::time::Duration::from_secs);
            return PlatesError::RateLimited { retry_after };
        }
        401 | 403 => return PlatesError::Auth(text),
        _ => {}
    }
    let lower = text.to_lowercase();
    if lower.contains("safety") || lower.contains("blocked") || lower.contains("prohibited") {
        return PlatesError::ContentBlocked(text);
    }
    PlatesError::Api {
        status,
        message: text,
    }
}

/// Returns the first inline image of the first candidate, in part order.
///
/// Blocked prompts, safety stops and text-only answers all yield `None`.
fn first_inline_image(response: GeminiResponse) -> Option<DataUrl> {
    if let Some(reason) = response
        .prompt_feedback
        .as_ref()
        .and_then(|f| f.block_reason.as_deref())
    {
        tracing::warn!(block_reason = reason, "Gemini blocked the prompt; no image returned");
        return None;
    }

    let candidate = response.candidates.into_iter().next();
    let finish_reason = candidate.as_ref().and_then(|c| c.finish_reason.clone());
    let parts = candidate
        .and_then(|c| c.content)
        .map(|c| c.parts)
        .unwrap_or_default();

    for part in parts {
        if let Some(inline) = part.inline_data {
            return Some(DataUrl::new(inline.mime_type, inline.data));
        }
        if let Some(text) = part.text {
            tracing::debug!(text = %text, "Gemini text part");
        }
    }

    tracing::warn!(
        finish_reason = finish_reason.as_deref().unwrap_or("none"),
        "no image part found in the Gemini response"
    );
    None
}

// Request/Response types
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiRequestPart>,
}

/// A part in a Gemini request - either inline image data or text.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiRequestPart {
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
    Text {
        text: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiConfig {
    response_modalities: Vec<String>,
}

impl GeminiRequest {
    fn from_edit_request(req: &EditRequest<'_>) -> Self {
        let parts = vec![
            GeminiRequestPart::InlineData {
                inline_data: GeminiInlineData {
                    mime_type: req.mime_type.to_string(),
                    data: req.image.to_string(),
                },
            },
            GeminiRequestPart::Text {
                text: req.prompt.to_string(),
            },
        ];

        Self {
            contents: vec![GeminiContent { parts }],
            generation_config: GeminiConfig {
                response_modalities: vec!["IMAGE".to_string(), "TEXT".to_string()],
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContentResponse>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPartResponse {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> GeminiResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_gemini_model_as_str() {
        assert_eq!(GeminiModel::NanoBanana.as_str(), "gemini-2.5-flash-image");
        assert_eq!(
            GeminiModel::NanoBananaPreview.as_str(),
            "gemini-2.5-flash-image-preview"
        );
        assert_eq!(GeminiModel::default(), GeminiModel::NanoBanana);
    }

    #[test]
    fn test_builder_with_explicit_key() {
        let client = GeminiClientBuilder::new()
            .api_key("test-key")
            .model(GeminiModel::NanoBananaPreview)
            .base_url("http://localhost:9999/v1beta/")
            .build()
            .unwrap();
        assert_eq!(client.model(), GeminiModel::NanoBananaPreview);
        assert_eq!(client.base_url, "http://localhost:9999/v1beta");
    }

    #[test]
    fn test_request_has_image_then_prompt() {
        let source = DataUrl::new("image/webp", "UklGRg==");
        let req = EditRequest::new(&source, "A wide shot");
        let json = serde_json::to_value(GeminiRequest::from_edit_request(&req)).unwrap();

        let parts = &json["contents"][0]["parts"];
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/webp");
        assert_eq!(parts[0]["inlineData"]["data"], "UklGRg==");
        assert_eq!(parts[1]["text"], "A wide shot");
        assert_eq!(
            json["generationConfig"]["responseModalities"],
            serde_json::json!(["IMAGE", "TEXT"])
        );
    }

    #[test]
    fn test_first_inline_image_wins() {
        let resp = parse(
            r#"{
            "candidates": [{
                "content": {
                    "parts": [
                        {"text": "Here is your shot"},
                        {"inlineData": {"mimeType": "image/png", "data": "iVBORw0KGgo="}},
                        {"inlineData": {"mimeType": "image/jpeg", "data": "/9j/"}}
                    ]
                },
                "finishReason": "STOP"
            }]
        }"#,
        );
        let image = first_inline_image(resp).unwrap();
        assert_eq!(image.to_string(), "data:image/png;base64,iVBORw0KGgo=");
    }

    #[test]
    fn test_text_only_response_is_absent() {
        let resp = parse(
            r#"{"candidates": [{"content": {"parts": [{"text": "I cannot do that"}]}}]}"#,
        );
        assert!(first_inline_image(resp).is_none());
    }

    #[test]
    fn test_empty_and_blocked_responses_are_absent() {
        assert!(first_inline_image(parse(r#"{}"#)).is_none());
        assert!(first_inline_image(parse(r#"{"candidates": [{"finishReason": "IMAGE_SAFETY"}]}"#)).is_none());
        assert!(first_inline_image(parse(
            r#"{"candidates": [], "promptFeedback": {"blockReason": "SAFETY"}}"#
        ))
        .is_none());
    }

    #[test]
    fn test_parse_error_classification() {
        let headers = reqwest::header::HeaderMap::new();
        assert!(matches!(parse_error(401, "nope", &headers), PlatesError::Auth(_)));
        assert!(matches!(parse_error(402, "", &headers), PlatesError::Billing(_)));
        assert!(matches!(
            parse_error(404, "", &headers),
            PlatesError::InvalidRequest(_)
        ));
        assert!(matches!(
            parse_error(429, "", &headers),
            PlatesError::RateLimited { retry_after: None }
        ));
        assert!(matches!(
            parse_error(400, "Request blocked by safety settings", &headers),
            PlatesError::ContentBlocked(_)
        ));
        assert!(matches!(
            parse_error(500, "boom", &headers),
            PlatesError::Api { status: 500, .. }
        ));
    }

    #[tokio::test]
    async fn test_transport_failure_is_wrapped() {
        // Nothing listens on port 9 of localhost; the connection is refused.
        let client = GeminiClient::builder()
            .api_key("test-key")
            .base_url("http://127.0.0.1:9/v1beta")
            .build()
            .unwrap();
        let source = DataUrl::new("image/png", "AAAA");
        let err = client
            .generate(&EditRequest::new(&source, "prompt"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "failed to generate image from Gemini API");
        assert!(matches!(err.root_cause(), PlatesError::Network(_)));
    }

    #[tokio::test]
    async fn test_health_check_unreachable() {
        let client = GeminiClient::builder()
            .api_key("test-key")
            .base_url("http://127.0.0.1:9/v1beta/")
            .build()
            .unwrap();
        let err = client.health_check().await.unwrap_err();
        assert!(matches!(err, PlatesError::Network(_)));
        assert!(err.is_retryable());
    }
}
