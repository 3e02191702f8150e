use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, error, info};

/// Raw failure from the provider, before classification.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("status={status} body={body}")]
    Status { status: u16, body: String },
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("provider unavailable, connection failed: {0}")]
    Unavailable(String),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("empty response: no image data in response")]
    NoImage,
}

/// An image travelling to or from the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: Bytes,
}

impl InlineImage {
    pub fn new(mime_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self { mime_type: mime_type.into(), data: data.into() }
    }

    /// Detects the MIME type from the magic bytes, falling back to PNG.
    pub fn sniff(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let mime_type = image::guess_format(&data)
            .map(|f| f.to_mime_type().to_string())
            .unwrap_or_else(|_| "image/png".to_string());
        Self { mime_type, data }
    }

    fn to_part(&self) -> Value {
        json!({
            "inlineData": {
                "mimeType": self.mime_type,
                "data": base64::engine::general_purpose::STANDARD.encode(&self.data),
            }
        })
    }
}

#[derive(Debug, Clone)]
pub enum ContentPart {
    Text(String),
    Image(InlineImage),
}

#[derive(Debug, Clone, Default)]
pub struct ProviderRequest {
    pub model: String,
    pub parts: Vec<ContentPart>,
    /// Schema for constrained JSON output.
    pub response_schema: Option<Value>,
    pub aspect_ratio: Option<String>,
    pub want_image: bool,
}

impl ProviderRequest {
    pub fn images(&self) -> impl Iterator<Item = &InlineImage> {
        self.parts.iter().filter_map(|p| match p {
            ContentPart::Image(img) => Some(img),
            ContentPart::Text(_) => None,
        })
    }

    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::Text(t) => Some(t.as_str()),
                ContentPart::Image(_) => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProviderResponse {
    pub texts: Vec<String>,
    pub images: Vec<InlineImage>,
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        // reqwest's Display omits the source, so keep the whole chain for classification
        let mut message = e.to_string();
        let mut source = std::error::Error::source(&e);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        if e.is_timeout() {
            ProviderError::Timeout(message)
        } else if e.is_connect() {
            ProviderError::Unavailable(message)
        } else {
            ProviderError::Http(message)
        }
    }
}

impl ProviderResponse {
    pub fn into_first_image(self) -> Result<InlineImage, ProviderError> {
        self.images.into_iter().next().ok_or(ProviderError::NoImage)
    }
}

/// The content-generation capability the studio pipeline depends on.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    async fn generate(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError>;
}

// Helper function to truncate base64 data in JSON for cleaner logging
fn truncate_base64_in_json(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                if key == "data" {
                    if let Value::String(s) = val {
                        if s.len() > 100 && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '=') {
                            *val = Value::String(format!("{}...[truncated {} chars]", &s[..50], s.len() - 50));
                        }
                    }
                } else {
                    truncate_base64_in_json(val);
                }
            }
        }
        Value::Array(arr) => {
            for val in arr.iter_mut() {
                truncate_base64_in_json(val);
            }
        }
        _ => {}
    }
}

/// Upper bound for one generateContent round trip; image generation is slow.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    /// The key is resolved by the caller; the client never reads the environment.
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self, ProviderError> {
        Self::with_timeout(api_key, base_url, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn build_body(request: &ProviderRequest) -> Value {
        let parts: Vec<Value> = request
            .parts
            .iter()
            .map(|p| match p {
                ContentPart::Text(text) => json!({ "text": text }),
                ContentPart::Image(img) => img.to_part(),
            })
            .collect();

        let mut generation_config = json!({ "candidateCount": 1 });
        if let Some(schema) = &request.response_schema {
            generation_config["responseMimeType"] = json!("application/json");
            generation_config["responseSchema"] = schema.clone();
            generation_config["temperature"] = json!(0.2);
        }
        if request.want_image {
            generation_config["responseModalities"] = json!(["IMAGE", "TEXT"]);
            generation_config["temperature"] = json!(0.4);
        }
        if let Some(ratio) = &request.aspect_ratio {
            generation_config["imageConfig"] = json!({ "aspectRatio": ratio });
        }

        json!({
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": generation_config,
        })
    }
}

#[async_trait]
impl ImageProvider for GeminiClient {
    async fn generate(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, request.model);
        let body = Self::build_body(&request);

        if tracing::enabled!(tracing::Level::DEBUG) {
            let mut logged = body.clone();
            truncate_base64_in_json(&mut logged);
            debug!("📤 Request body: {}", logged);
        }
        info!(model = %request.model, images = request.images().count(), "🔗 Calling Gemini generateContent");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            error!("❌ Gemini API error {}: {}", status, response_text);
            return Err(ProviderError::Status { status: status.as_u16(), body: response_text });
        }

        parse_response(&response_text)
    }
}

// --- Response Parsing Helpers ---

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

#[derive(Debug, Deserialize, Default)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Part {
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    Text {
        text: String,
    },
    #[allow(dead_code)]
    Other(Value),
}

#[derive(Debug, Deserialize)]
struct InlineData {
    data: String,
    #[serde(rename = "mimeType")]
    mime_type: String,
}

pub fn parse_response(raw: &str) -> Result<ProviderResponse, ProviderError> {
    let parsed: GeminiResponse =
        serde_json::from_str(raw).map_err(|e| ProviderError::Malformed(format!("parse error: {}", e)))?;

    let mut out = ProviderResponse::default();
    for candidate in parsed.candidates {
        for part in candidate.content.parts {
            match part {
                Part::Inline { inline_data } => {
                    let data = base64::engine::general_purpose::STANDARD
                        .decode(inline_data.data.as_bytes())
                        .map_err(|e| ProviderError::Malformed(format!("image base64 decode failed: {}", e)))?;
                    debug!("🎯 Found image data with mime type: {}", inline_data.mime_type);
                    out.images.push(InlineImage::new(inline_data.mime_type, data));
                }
                Part::Text { text } => out.texts.push(text),
                Part::Other(_) => {}
            }
        }
    }
    Ok(out)
}
