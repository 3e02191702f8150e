use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use photoshoot_studio::{
    analyzer::GarmentAnalyzer,
    gemini::{ImageProvider, InlineImage, ProviderError, ProviderRequest, ProviderResponse},
    refiner::ImageRefiner,
    retry::RetryPolicy,
    routes::AppState,
    sequence::SequenceGenerator,
};

pub const JACKET_JSON: &str = r#"{"garmentType":"jacket","fabric":"wool","colorPalette":["navy","gold"],
    "style":"tailored","gender":"Male","uniquenessLevel":"gold button embossing"}"#;

/// Replays a script, then answers every further call with a distinct small image.
#[derive(Default)]
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<ProviderResponse, ProviderError>>>,
    calls: Mutex<Vec<ProviderRequest>>,
    latency: Option<Duration>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Result<ProviderResponse, ProviderError>>) -> Arc<Self> {
        Arc::new(Self { script: Mutex::new(script.into()), ..Default::default() })
    }

    /// Every call is recorded immediately, then answered after `latency`.
    pub fn slow(latency: Duration) -> Arc<Self> {
        Arc::new(Self { latency: Some(latency), ..Default::default() })
    }

    pub fn calls(&self) -> Vec<ProviderRequest> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ImageProvider for ScriptedProvider {
    async fn generate(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let n = {
            let mut calls = self.calls.lock();
            calls.push(request);
            calls.len()
        };
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.script.lock().pop_front().unwrap_or_else(|| {
            Ok(ProviderResponse { texts: vec![], images: vec![InlineImage::new("image/png", vec![n as u8; 8])] })
        })
    }
}

pub fn text(json: &str) -> Result<ProviderResponse, ProviderError> {
    Ok(ProviderResponse { texts: vec![json.to_string()], images: vec![] })
}

pub fn state_with(provider: Arc<ScriptedProvider>) -> AppState {
    state_with_limit(provider, 10)
}

pub fn state_with_limit(provider: Arc<ScriptedProvider>, history_limit: usize) -> AppState {
    AppState::from_parts(
        GarmentAnalyzer::new(provider.clone(), "vision").with_policy(RetryPolicy::immediate(3)),
        SequenceGenerator::new(provider.clone(), "image").with_policy(RetryPolicy::immediate(3)),
        ImageRefiner::new(provider, "image").with_policy(RetryPolicy::immediate(2)),
        history_limit,
    )
}
