use std::sync::Arc;

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::StudioError;
use crate::gemini::{ContentPart, ImageProvider, InlineImage, ProviderError, ProviderRequest};
use crate::models::GarmentAnalysis;
use crate::retry::RetryPolicy;

pub const ANALYSIS_ATTEMPTS: u32 = 3;

const ANALYSIS_PROMPT: &str = "You are a fashion technologist cataloguing a garment for a product photoshoot. \
Study the garment in the image and return a JSON object with exactly these fields: \
garmentType (the category, e.g. blazer, maxi dress), \
fabric (material and texture), \
colorPalette (an ordered list: the single primary color FIRST, followed by every secondary and accent color), \
style (fit and silhouette), \
gender (Male, Female or Unisex), \
uniquenessLevel (an EXHAUSTIVE description of every pattern, print, embroidery, embellishment, button, trim and \
hardware detail, including placement, scale and color, precise enough to reproduce the garment exactly). \
Do not summarise uniquenessLevel and do not omit small details.";

/// Response schema in the provider's OpenAPI subset.
pub fn analysis_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "garmentType": { "type": "STRING" },
            "fabric": { "type": "STRING" },
            "colorPalette": { "type": "ARRAY", "items": { "type": "STRING" } },
            "style": { "type": "STRING" },
            "gender": { "type": "STRING", "enum": ["Male", "Female", "Unisex"] },
            "uniquenessLevel": { "type": "STRING" }
        },
        "required": ["garmentType", "fabric", "colorPalette", "style", "gender", "uniquenessLevel"],
        "propertyOrdering": ["garmentType", "fabric", "colorPalette", "style", "gender", "uniquenessLevel"]
    })
}

/// Parses and validates the provider's JSON; any defect is a malformed response.
pub fn parse_analysis(raw: &str) -> Result<GarmentAnalysis, ProviderError> {
    let trimmed = raw.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .unwrap_or(trimmed);
    let analysis: GarmentAnalysis =
        serde_json::from_str(body.trim()).map_err(|e| ProviderError::Malformed(format!("garment analysis: {}", e)))?;
    analysis.validate().map_err(ProviderError::Malformed)?;
    Ok(analysis)
}

pub struct GarmentAnalyzer {
    provider: Arc<dyn ImageProvider>,
    model: String,
    policy: RetryPolicy,
}

impl GarmentAnalyzer {
    pub fn new(provider: Arc<dyn ImageProvider>, model: impl Into<String>) -> Self {
        Self { provider, model: model.into(), policy: RetryPolicy::new(ANALYSIS_ATTEMPTS) }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub async fn analyze(&self, garment: &InlineImage, cancel: &CancellationToken) -> Result<GarmentAnalysis, StudioError> {
        if garment.data.is_empty() {
            return Err(StudioError::InvalidInput("garment image is empty".into()));
        }
        info!(mime = %garment.mime_type, bytes = garment.data.len(), "🧵 Analyzing garment");

        let provider = self.provider.as_ref();
        let request = ProviderRequest {
            model: self.model.clone(),
            parts: vec![ContentPart::Image(garment.clone()), ContentPart::Text(ANALYSIS_PROMPT.to_string())],
            response_schema: Some(analysis_schema()),
            ..Default::default()
        };

        let analysis = self
            .policy
            .run("analyze", cancel, move |_| {
                let request = request.clone();
                async move {
                    let response = provider.generate(request).await?;
                    parse_analysis(&response.texts.concat())
                }
            })
            .await?;

        info!(garment_type = %analysis.garment_type, primary = %analysis.primary_color(), "✅ Garment analysed");
        Ok(analysis)
    }
}
