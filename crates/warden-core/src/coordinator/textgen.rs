//! Text-generation backend and the handlers built on top of it.
//!
//! Warden never generates text itself. Handlers that need prose hand a prompt
//! to a [`TextGenerator`]; the default implementation talks to an HTTP
//! service that accepts `{"prompt": ...}` and answers `{"text": ...}`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use super::handler::{HandlerError, TaskHandler};
use crate::payload::Payload;

/// Default request timeout for the text-generation backend.
pub const DEFAULT_TEXTGEN_TIMEOUT: Duration = Duration::from_secs(20);

/// Errors from the text-generation backend.
#[derive(Debug, Error)]
pub enum TextGenError {
    /// The request could not be sent or the response could not be read.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("backend returned status {0}")]
    Status(u16),

    /// The backend answered without any text.
    #[error("backend returned no text")]
    EmptyResponse,
}

/// Produces text for a prompt.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generates a completion for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String, TextGenError>;
}

/// Configuration for [`HttpTextGenerator`].
#[derive(Debug, Clone)]
pub struct HttpTextGeneratorConfig {
    /// URL the prompt is POSTed to.
    pub endpoint: String,
    /// Whole-request timeout.
    pub timeout: Duration,
    /// Optional bearer token.
    pub api_key: Option<String>,
}

impl HttpTextGeneratorConfig {
    /// Creates a config for `endpoint` with the default timeout.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout: DEFAULT_TEXTGEN_TIMEOUT,
            api_key: None,
        }
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the bearer token.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    prompt: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    text: Option<String>,
}

/// [`TextGenerator`] backed by an HTTP service.
#[derive(Debug, Clone)]
pub struct HttpTextGenerator {
    client: Client,
    config: HttpTextGeneratorConfig,
}

impl HttpTextGenerator {
    /// Builds the HTTP client.
    pub fn new(config: HttpTextGeneratorConfig) -> Result<Self, TextGenError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &HttpTextGeneratorConfig {
        &self.config
    }
}

#[async_trait]
impl TextGenerator for HttpTextGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, TextGenError> {
        let mut request = self
            .client
            .post(&self.config.endpoint)
            .json(&GenerateRequest { prompt });

        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TextGenError::Status(status.as_u16()));
        }

        let body: GenerateResponse = response.json().await?;
        match body.text {
            Some(text) if !text.trim().is_empty() => {
                debug!(chars = text.len(), "Text generated");
                Ok(text)
            }
            _ => Err(TextGenError::EmptyResponse),
        }
    }
}

const ASSESSMENT_FEEDBACK_INSTRUCTION: &str = "You are an assessment analyst. Using the \
assessment data below, write constructive, encouraging feedback for the entrepreneur: \
summarise their strengths, name the areas that need the most work, and suggest concrete \
next steps. Do not give financial, legal, tax or medical advice.";

const BUSINESS_MENTORSHIP_INSTRUCTION: &str = "You are a business mentor. Using the \
context below, give practical guidance on the question asked, grounded in the details \
provided. Point the user to qualified professionals for anything that needs financial, \
legal, tax or medical expertise.";

/// Task handler that turns a payload into a prompt for a [`TextGenerator`].
pub struct TextGenerationHandler {
    name: String,
    instruction: String,
    generator: Arc<dyn TextGenerator>,
}

impl TextGenerationHandler {
    /// Creates a handler with a custom instruction.
    pub fn new(
        name: impl Into<String>,
        instruction: impl Into<String>,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        Self {
            name: name.into(),
            instruction: instruction.into(),
            generator,
        }
    }

    /// Handler for `assessment_feedback` tasks.
    pub fn assessment_feedback(generator: Arc<dyn TextGenerator>) -> Self {
        Self::new(
            "assessment_feedback_handler",
            ASSESSMENT_FEEDBACK_INSTRUCTION,
            generator,
        )
    }

    /// Handler for `business_mentorship` tasks.
    pub fn business_mentorship(generator: Arc<dyn TextGenerator>) -> Self {
        Self::new(
            "business_mentorship_handler",
            BUSINESS_MENTORSHIP_INSTRUCTION,
            generator,
        )
    }

    /// Builds the prompt for a payload.
    pub fn prompt(&self, payload: &Payload) -> Result<String, HandlerError> {
        let data = serde_json::to_string_pretty(payload)
            .map_err(|e| HandlerError::InvalidPayload(e.to_string()))?;
        Ok(format!("{}\n\nData:\n{}", self.instruction, data))
    }
}

#[async_trait]
impl TaskHandler for TextGenerationHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, payload: Payload) -> Result<Value, HandlerError> {
        if matches!(payload, Payload::Null) {
            return Err(HandlerError::InvalidPayload("no task data".to_string()));
        }

        let prompt = self.prompt(&payload)?;
        let content = self.generator.generate(&prompt).await?;
        Ok(json!({ "content": content }))
    }
}
