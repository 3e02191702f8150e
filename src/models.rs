use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{base64::Base64, serde_as};
use uuid::Uuid;

use crate::gemini::InlineImage;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Male,
    Female,
    Unisex,
}

/// Structured description of an uploaded garment. Immutable once extracted.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GarmentAnalysis {
    pub garment_type: String,
    pub fabric: String,
    /// Primary color first, then secondary/accent colors. Never re-sorted.
    pub color_palette: Vec<String>,
    pub style: String,
    pub gender: Gender,
    /// Exhaustive free-text description of patterns, embroidery and embellishments.
    pub uniqueness_level: String,
}

impl GarmentAnalysis {
    pub fn primary_color(&self) -> &str {
        self.color_palette.first().map(String::as_str).unwrap_or("unspecified")
    }

    pub fn secondary_colors(&self) -> &[String] {
        self.color_palette.get(1..).unwrap_or(&[])
    }

    /// Client-side schema check on top of the provider's constrained decoding.
    pub fn validate(&self) -> Result<(), String> {
        if self.garment_type.trim().is_empty() {
            return Err("garmentType is empty".into());
        }
        if self.color_palette.iter().all(|c| c.trim().is_empty()) {
            return Err("colorPalette has no primary color".into());
        }
        Ok(())
    }
}

#[serde_as]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedFrame {
    pub id: String,
    #[serde_as(as = "Base64")]
    pub image_bytes: Bytes,
    pub mime_type: String,
    /// Pose this frame was generated for, or the edit instruction for refined frames.
    pub label: String,
}

impl GeneratedFrame {
    pub fn new(image: InlineImage, label: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            image_bytes: image.data,
            mime_type: image.mime_type,
            label: label.into(),
        }
    }

    pub fn image(&self) -> InlineImage {
        InlineImage::new(self.mime_type.clone(), self.image_bytes.clone())
    }
}

/// `(index, total, is_retry)` reported before every provider attempt; `index` is 1-based.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    pub index: usize,
    pub total: usize,
    pub is_retry: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ShootStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// One photoshoot session as kept in the history.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Shoot {
    pub id: Uuid,
    pub analysis: GarmentAnalysis,
    pub scene: String,
    pub model: String,
    pub poses: Vec<String>,
    pub frames: Vec<GeneratedFrame>,
    pub status: ShootStatus,
    pub progress: Progress,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub garment: Option<InlineImage>,
}

#[serde_as]
#[derive(Debug, Deserialize, Clone)]
pub struct AnalyzeRequest {
    #[serde_as(as = "Base64")]
    pub image_base64: Vec<u8>,
}

#[serde_as]
#[derive(Debug, Deserialize, Clone)]
pub struct CreateShootRequest {
    #[serde_as(as = "Base64")]
    pub garment_image_base64: Vec<u8>,
    #[serde(default)]
    pub analysis: Option<GarmentAnalysis>,
    /// Scene preset id or free-text scene description.
    pub scene: String,
    /// Model preset id or free-text model description.
    pub model: String,
    #[serde(default)]
    pub poses: Option<Vec<String>>,
    #[serde(default)]
    pub pose_set: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RefineRequest {
    pub instruction: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn palette_order_is_primary_first() {
        let a: GarmentAnalysis = serde_json::from_str(
            r#"{"garmentType":"jacket","fabric":"wool","colorPalette":["navy","gold","ivory"],
                "style":"tailored","gender":"Unisex","uniquenessLevel":"gold button embossing"}"#,
        )
        .unwrap();
        assert_eq!(a.primary_color(), "navy");
        assert_eq!(a.secondary_colors(), &["gold".to_string(), "ivory".to_string()]);
        assert!(a.validate().is_ok());
    }

    #[test]
    fn empty_palette_fails_validation() {
        let a = GarmentAnalysis {
            garment_type: "blazer".into(),
            fabric: String::new(),
            color_palette: vec![],
            style: String::new(),
            gender: Gender::Female,
            uniqueness_level: String::new(),
        };
        assert!(a.validate().is_err());
        assert_eq!(a.secondary_colors().len(), 0);
    }

    #[test]
    fn frame_serializes_bytes_as_base64() {
        let frame = GeneratedFrame::new(InlineImage::new("image/png", vec![1u8, 2, 3]), "front");
        let v = serde_json::to_value(&frame).unwrap();
        assert_eq!(v["imageBytes"], "AQID");
        assert_eq!(v["mimeType"], "image/png");
        let back: GeneratedFrame = serde_json::from_value(v).unwrap();
        assert_eq!(back, frame);
    }
}
