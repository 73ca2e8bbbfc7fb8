//! # Text Generation
//!
//! The pipeline's second external collaborator. A [`Generator`] takes a
//! prompt plus sampling parameters and returns generated text, or fails
//! with a [`GeneratorError`]. Every failure means the same thing to the
//! pipeline: "generator unavailable", take the deterministic path.
//!
//! | Generator | Description |
//! |-----------|-------------|
//! | [`Unconfigured`] | Always unavailable; used when no API key is set |
//! | [`OpenAiCompatible`] | Any `/v1/chat/completions` endpoint |

pub mod openai;

use async_trait::async_trait;
use serde::Serialize;

pub use openai::{OpenAiCompatible, OpenAiConfig};

/// One generation call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub max_tokens: u32,
    /// In `[0, 1]`.
    pub temperature: f32,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, max_tokens: u32, temperature: f32) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens,
            temperature: temperature.clamp(0.0, 1.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeneratorError {
    #[error("generator is not configured")]
    Unconfigured,

    #[error("generator request timed out")]
    Timeout,

    #[error("generator transport error: {0}")]
    Transport(String),

    #[error("generator returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("malformed generator response: {0}")]
    Malformed(String),
}

/// A stateless text-generation service.
#[async_trait]
pub trait Generator: Send + Sync + 'static {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GeneratorError>;
}

/// Generator used when no credentials are configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unconfigured;

#[async_trait]
impl Generator for Unconfigured {
    async fn generate(&self, _request: &GenerationRequest) -> Result<String, GeneratorError> {
        Err(GeneratorError::Unconfigured)
    }
}

#[async_trait]
impl<G: Generator + ?Sized> Generator for std::sync::Arc<G> {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GeneratorError> {
        (**self).generate(request).await
    }
}

#[async_trait]
impl<G: Generator + ?Sized> Generator for Box<G> {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GeneratorError> {
        (**self).generate(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_always_fails() {
        let req = GenerationRequest::new("hello", 10, 0.0);
        assert_eq!(Unconfigured.generate(&req).await, Err(GeneratorError::Unconfigured));
    }

    #[test]
    fn test_temperature_clamped() {
        assert_eq!(GenerationRequest::new("x", 1, 3.0).temperature, 1.0);
        assert_eq!(GenerationRequest::new("x", 1, -1.0).temperature, 0.0);
    }

    #[tokio::test]
    async fn test_boxed_generator_delegates() {
        let boxed: Box<dyn Generator> = Box::new(Unconfigured);
        let req = GenerationRequest::new("x", 1, 0.0);
        assert!(boxed.generate(&req).await.is_err());
    }
}
