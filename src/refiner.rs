use std::sync::Arc;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::StudioError;
use crate::gemini::{ContentPart, ImageProvider, InlineImage, ProviderRequest};
use crate::retry::RetryPolicy;

/// Interactive path, so one retry at most.
pub const REFINE_ATTEMPTS: u32 = 2;

const PRESERVE_CONSTRAINT: &str =
    "Preserve the garment design exactly (cut, colors, patterns, embellishments) and keep the subject's identity unchanged.";

/// Single-shot edit of one generated frame.
pub struct ImageRefiner {
    provider: Arc<dyn ImageProvider>,
    model: String,
    policy: RetryPolicy,
}

impl ImageRefiner {
    pub fn new(provider: Arc<dyn ImageProvider>, model: impl Into<String>) -> Self {
        Self { provider, model: model.into(), policy: RetryPolicy::new(REFINE_ATTEMPTS) }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub async fn refine(
        &self,
        image: &InlineImage,
        instruction: &str,
        cancel: &CancellationToken,
    ) -> Result<InlineImage, StudioError> {
        let instruction = instruction.trim();
        if instruction.is_empty() {
            return Err(StudioError::InvalidInput("edit instruction is empty".into()));
        }
        info!(instruction, "🎨 Refining frame");

        let provider = self.provider.as_ref();
        let request = ProviderRequest {
            model: self.model.clone(),
            parts: vec![
                ContentPart::Image(image.clone()),
                ContentPart::Text(format!("Edit this photograph: {}\n\n{}", instruction, PRESERVE_CONSTRAINT)),
            ],
            want_image: true,
            ..Default::default()
        };

        let refined = self
            .policy
            .run("refine", cancel, move |_| {
                let request = request.clone();
                async move { provider.generate(request).await?.into_first_image() }
            })
            .await?;

        // Always hand back an owned buffer, never a view into the caller's image.
        Ok(InlineImage { mime_type: refined.mime_type, data: Bytes::copy_from_slice(&refined.data) })
    }
}
