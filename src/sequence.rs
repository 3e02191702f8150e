//! Multi-pose sequence generation with a master anchor frame.
//!
//! Frames are produced strictly one after another. The first frame that comes
//! back establishes the model identity and environment; every later request
//! re-submits that frame next to the garment photo with a hard instruction to
//! reuse face, hair, skin tone, background and lighting, changing only the pose.

use std::sync::{Arc, OnceLock};

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::StudioError;
use crate::gemini::{ContentPart, ImageProvider, InlineImage, ProviderRequest};
use crate::models::{GarmentAnalysis, GeneratedFrame, Progress};
use crate::retry::RetryPolicy;

pub const FRAME_ATTEMPTS: u32 = 3;
pub const PORTRAIT_ASPECT_RATIO: &str = "3:4";

/// The first successful frame of a sequence. Set at most once, never replaced.
#[derive(Debug, Default)]
pub struct MasterAnchor(OnceLock<InlineImage>);

impl MasterAnchor {
    pub fn get(&self) -> Option<&InlineImage> {
        self.0.get()
    }

    /// Returns `false` (and keeps the existing image) if the anchor is already set.
    pub fn establish(&self, image: InlineImage) -> bool {
        self.0.set(image).is_ok()
    }
}

/// Everything a sequence needs besides the pose list's position.
#[derive(Debug, Clone, Copy)]
pub struct ShootBrief<'a> {
    pub garment: &'a InlineImage,
    pub analysis: &'a GarmentAnalysis,
    pub scene: &'a str,
    pub model: &'a str,
    pub poses: &'a [String],
}

pub fn production_rules(analysis: &GarmentAnalysis, model: &str, scene: &str) -> String {
    let secondary = if analysis.secondary_colors().is_empty() {
        "none".to_string()
    } else {
        analysis.secondary_colors().join(", ")
    };
    format!(
        "PRODUCTION RULES (apply to every frame):\n\
         - Garment: {garment} ({fabric}; {style}). Reproduce it exactly as shown in the FIRST reference image.\n\
         - Primary color: {primary}. Secondary colors: {secondary}.\n\
         - Patterns and embellishments, reproduce every detail: {details}\n\
         - Model: {model}\n\
         - Scene: {scene}\n\
         - Photography: ultra-high resolution editorial fashion photograph, tack-sharp focus on the garment, \
         professional soft key light with natural fill, true-to-life fabric texture, full-length portrait framing.\n\
         - Never add, remove or restyle garment details. No text, watermarks or logos.",
        garment = analysis.garment_type,
        fabric = analysis.fabric,
        style = analysis.style,
        primary = analysis.primary_color(),
        secondary = secondary,
        details = analysis.uniqueness_level,
        model = model,
        scene = scene,
    )
}

pub fn frame_directive(pose: &str, anchored: bool) -> String {
    if anchored {
        format!(
            "CONSISTENCY LOCK: the SECOND reference image is the master frame of this shoot. \
             You MUST reuse exactly the same face, hairstyle, hair color and skin tone, and exactly the same \
             background, lighting and room geometry shown in it. Change ONLY the pose, to: {pose}. \
             Any change to identity or environment is a failed frame."
        )
    } else {
        format!(
            "ESTABLISH: create the definitive model identity and environment for this photoshoot. \
             Use the FIRST reference image as the sole source for the outfit. Pose: {pose}."
        )
    }
}

pub struct SequenceGenerator {
    provider: Arc<dyn ImageProvider>,
    model: String,
    policy: RetryPolicy,
    aspect_ratio: String,
}

impl SequenceGenerator {
    pub fn new(provider: Arc<dyn ImageProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            policy: RetryPolicy::new(FRAME_ATTEMPTS),
            aspect_ratio: PORTRAIT_ASPECT_RATIO.to_string(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Generates one frame per pose, in pose order. Either every frame is
    /// returned or the call fails; a frame that exhausts its retries aborts the
    /// remaining poses.
    pub async fn generate_sequence(
        &self,
        brief: ShootBrief<'_>,
        on_progress: &mut (dyn FnMut(Progress) + Send),
        cancel: &CancellationToken,
    ) -> Result<Vec<GeneratedFrame>, StudioError> {
        let anchor = MasterAnchor::default();
        self.run_sequence(brief, &anchor, on_progress, cancel).await
    }

    async fn run_sequence(
        &self,
        brief: ShootBrief<'_>,
        anchor: &MasterAnchor,
        on_progress: &mut (dyn FnMut(Progress) + Send),
        cancel: &CancellationToken,
    ) -> Result<Vec<GeneratedFrame>, StudioError> {
        let total = brief.poses.len();
        let rules = production_rules(brief.analysis, brief.model, brief.scene);
        let provider = self.provider.as_ref();
        let mut frames = Vec::with_capacity(total);

        info!(total, garment = %brief.analysis.garment_type, "📸 Starting pose sequence");

        for (i, pose) in brief.poses.iter().enumerate() {
            let index = i + 1;
            let master = anchor.get();

            let mut parts = vec![ContentPart::Image(brief.garment.clone())];
            if let Some(master) = master {
                parts.push(ContentPart::Image(master.clone()));
            }
            parts.push(ContentPart::Text(format!("{}\n\n{}", rules, frame_directive(pose, master.is_some()))));

            let request = ProviderRequest {
                model: self.model.clone(),
                parts,
                aspect_ratio: Some(self.aspect_ratio.clone()),
                want_image: true,
                ..Default::default()
            };

            let progress = &mut *on_progress;
            let label = format!("frame {}/{}", index, total);
            let image = self
                .policy
                .run(&label, cancel, move |attempt| {
                    progress(Progress { index, total, is_retry: attempt > 1 });
                    let request = request.clone();
                    async move { provider.generate(request).await?.into_first_image() }
                })
                .await?;

            if anchor.establish(image.clone()) {
                info!(frame = index, "⚓ Master anchor established");
            }
            info!(frame = index, total, pose = %pose, bytes = image.data.len(), "✅ Frame generated");
            frames.push(GeneratedFrame::new(image, pose.clone()));
        }

        Ok(frames)
    }
}
