//! Text generation capability.
//!
//! Agents only ever see [`TextGenerator`]: give it a prompt and the facts the
//! prompt is grounded in, get text back or an upstream error. Everything
//! provider-specific lives behind it.

pub mod chat;
pub mod prompt;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::agent::Persona;
use crate::config::LlmConfig;
use crate::error::{Error, Result};

pub use chat::ChatCompletionsClient;

/// Name used for the text generation service in upstream errors.
pub const SERVICE_NAME: &str = "text-generation";

/// One request for narrative text.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// Persona whose voice the text should use.
    pub persona: Persona,
    /// The instruction for this turn.
    pub prompt: String,
    /// Structured facts the text must stay consistent with.
    pub grounding: Value,
    /// Upper bound on the length of the reply, in tokens.
    pub max_tokens: u32,
}

/// A capability that turns a prompt plus grounding facts into text.
///
/// Implementations may be slow and may fail; failures must be reported as
/// [`Error::UpstreamUnavailable`] or [`Error::UpstreamTimeout`].
#[async_trait]
pub trait TextGenerator: Send + Sync + std::fmt::Debug {
    /// Produce narrative text for the request.
    ///
    /// # Errors
    ///
    /// Returns an upstream error if no text could be produced.
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}

/// A generator that always reports itself unavailable.
///
/// Used when text generation is switched off or has no credentials, so every
/// agent answer runs in facts-only mode.
#[derive(Debug, Clone, Default)]
pub struct DisabledGenerator {
    reason: String,
}

impl DisabledGenerator {
    /// Create a disabled generator that explains why it is disabled.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl TextGenerator for DisabledGenerator {
    async fn generate(&self, _request: &GenerationRequest) -> Result<String> {
        Err(Error::upstream_unavailable(SERVICE_NAME, self.reason.clone()))
    }
}

/// Build the generator described by the configuration.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be constructed.
pub fn from_config(config: &LlmConfig) -> Result<Arc<dyn TextGenerator>> {
    if !config.enabled {
        return Ok(Arc::new(DisabledGenerator::new(
            "text generation is disabled in configuration",
        )));
    }
    match config.usable_api_key() {
        Some(_) => Ok(Arc::new(ChatCompletionsClient::from_config(config)?)),
        None => {
            tracing::warn!("No API key configured for text generation; answers will be facts only");
            Ok(Arc::new(DisabledGenerator::new("no API key configured")))
        }
    }
}
