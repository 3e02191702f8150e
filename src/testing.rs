//! Scripted provider double for unit tests.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::gemini::{ImageProvider, InlineImage, ProviderError, ProviderRequest, ProviderResponse};

/// Replays queued results in order and records every request it receives.
/// Once the script runs out it keeps answering with a fresh PNG-tagged image.
#[derive(Default)]
pub struct FakeProvider {
    script: Mutex<VecDeque<Result<ProviderResponse, ProviderError>>>,
    calls: Mutex<Vec<ProviderRequest>>,
}

impl FakeProvider {
    pub fn new(script: Vec<Result<ProviderResponse, ProviderError>>) -> Arc<Self> {
        Arc::new(Self { script: Mutex::new(script.into()), calls: Mutex::default() })
    }

    pub fn calls(&self) -> Vec<ProviderRequest> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ImageProvider for FakeProvider {
    async fn generate(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let n = {
            let mut calls = self.calls.lock();
            calls.push(request);
            calls.len()
        };
        self.script.lock().pop_front().unwrap_or_else(|| Ok(image_response(vec![n as u8; 4])))
    }
}

pub fn image_response(data: Vec<u8>) -> ProviderResponse {
    ProviderResponse { texts: vec![], images: vec![InlineImage::new("image/png", data)] }
}

pub fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse { texts: vec![text.to_string()], images: vec![] }
}
