//! LLM-backed message synthesizer over an OpenAI-compatible chat-completions API.
//!
//! Defaults to Groq (`https://api.groq.com/openai/v1`, `llama-3.1-8b-instant`). Calls are
//! blocking and bounded by the client timeout; the escalation machine substitutes the
//! fallback phrase on any error.

use crate::collaborators::MessageSynthesizer;
use crate::error::{GuardError, GuardResult};
use crate::types::PromptContext;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_LLM_API_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_LLM_MODEL: &str = "llama-3.1-8b-instant";
pub const DEFAULT_LLM_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
}

/// Phrases warnings with a hosted language model.
#[derive(Clone)]
pub struct LlmSynthesizer {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::blocking::Client,
}

impl std::fmt::Debug for LlmSynthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmSynthesizer")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl LlmSynthesizer {
    /// Create with an explicit key, default endpoint and model.
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> GuardResult<Self> {
        let api_key = api_key.into().trim().to_string();
        if api_key.is_empty() {
            return Err(GuardError::Config("LLM API key is empty".to_string()));
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GuardError::Config(format!("LLM client: {}", e)))?;
        Ok(Self {
            base_url: DEFAULT_LLM_API_URL.to_string(),
            api_key,
            model: DEFAULT_LLM_MODEL.to_string(),
            client,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body(&self, context: &PromptContext) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: context.prompt().to_string(),
            }],
            max_tokens: Some(64),
        }
    }
}

impl MessageSynthesizer for LlmSynthesizer {
    fn generate(&self, context: &PromptContext) -> GuardResult<String> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        debug!(level = context.level, tier = ?context.tier, "Requesting warning text");

        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(context))
            .send()
            .map_err(|e| GuardError::Synthesizer(format!("request failed: {}", e)))?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().unwrap_or_default();
            return Err(GuardError::Synthesizer(format!("API error {}: {}", status, body)));
        }

        let parsed: ChatResponse = res
            .json()
            .map_err(|e| GuardError::Synthesizer(format!("response parse failed: {}", e)))?;

        // Empty text is degraded output, not an error; the announcer skips it.
        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .unwrap_or_default())
    }
}
