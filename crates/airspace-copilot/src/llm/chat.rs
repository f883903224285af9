//! OpenAI-compatible chat completions client.
//!
//! Works against any endpoint that speaks the `/chat/completions` protocol;
//! the defaults point at Groq.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{prompt, GenerationRequest, TextGenerator, SERVICE_NAME};
use crate::config::LlmConfig;
use crate::error::{Error, Result};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Chat completions client.
#[derive(Debug, Clone)]
pub struct ChatCompletionsClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
}

impl ChatCompletionsClient {
    /// Create a client from the `[llm]` configuration section.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("airspace-copilot/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::upstream_unavailable(SERVICE_NAME, e.to_string()))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key: config.usable_api_key().map(str::to_string),
            temperature: config.temperature,
        })
    }

    /// The model requests are sent to.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_body<'a>(&'a self, request: &GenerationRequest) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: prompt::system_prompt(request.persona).to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt::with_grounding(&request.prompt, &request.grounding),
                },
            ],
            temperature: self.temperature,
            max_tokens: request.max_tokens,
        }
    }
}

#[async_trait]
impl TextGenerator for ChatCompletionsClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let body = self.build_body(request);

        let mut builder = self.http.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(map_transport_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::upstream_unavailable(
                SERVICE_NAME,
                format!("endpoint returned status {status}"),
            ));
        }

        let parsed: ChatResponse = response.json().await.map_err(map_transport_error)?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| Error::upstream_unavailable(SERVICE_NAME, "response has no content"))?;

        debug!(model = %self.model, persona = %request.persona, chars = text.len(), "Generated text");
        Ok(text)
    }
}

fn map_transport_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::upstream_timeout(format!("{SERVICE_NAME} request"))
    } else {
        Error::upstream_unavailable(SERVICE_NAME, err.to_string())
    }
}
