//! HTTP client for an OpenAI-compatible chat completions endpoint
//!
//! The categorization tiers are synchronous, so the client hides its async
//! transport. Inside the worker pool it borrows the pool's runtime through
//! `block_in_place`; on the main thread it drives a private current-thread
//! runtime.

use crate::config::AiConfig;
use crate::core::{AiClient, AiRequest};
use crate::types::StatementError;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tokio::runtime::{Handle, Runtime, RuntimeFlavor};
use tracing::debug;

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Build the system prompt for a rule set
pub fn system_prompt(allowed_categories: &[String]) -> String {
    let mut prompt = String::from(
        "You categorize bank transactions. Reply with the category name only, \
         without punctuation or explanation.",
    );
    if allowed_categories.is_empty() {
        prompt.push_str(" Use a short, general spending category.");
    } else {
        prompt.push_str(" Choose exactly one of: ");
        prompt.push_str(&allowed_categories.join(", "));
        prompt.push_str(". Reply Uncategorized if none fits.");
    }
    prompt
}

/// Chat-completions backed [`AiClient`]
pub struct HttpAiClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
    runtime: Runtime,
}

impl std::fmt::Debug for HttpAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpAiClient")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish()
    }
}

impl HttpAiClient {
    /// Create a client from the AI settings
    ///
    /// # Errors
    ///
    /// Returns `StatementError::Config` if no API key is configured or the
    /// HTTP client cannot be built.
    pub fn new(config: &AiConfig) -> Result<Self, StatementError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| StatementError::config("AI tier enabled without an API key"))?;

        // Connections must not outlive the runtime that opened them.
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| StatementError::config(format!("failed to build HTTP client: {}", e)))?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| StatementError::config(format!("failed to create tokio runtime: {}", e)))?;

        Ok(Self {
            http,
            endpoint: format!("{}/v1/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            api_key,
            runtime,
        })
    }

    async fn complete(&self, request: &AiRequest) -> Result<String, StatementError> {
        let user = serde_json::to_string(request)
            .map_err(|e| StatementError::categorization(format!("failed to encode request: {}", e)))?;

        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt(&request.allowed_categories),
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.0,
            max_tokens: 20,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(StatementError::categorization(format!(
                "AI service returned {}: {}",
                status,
                text.trim()
            )));
        }

        let parsed: ChatResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .unwrap_or_default();

        if content.is_empty() {
            return Err(StatementError::categorization("AI service returned an empty answer"));
        }
        Ok(content)
    }
}

impl AiClient for HttpAiClient {
    fn categorize(&self, request: &AiRequest) -> Result<String, StatementError> {
        debug!(party = %request.party_name, "querying AI service");
        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| handle.block_on(self.complete(request)))
            }
            Ok(_) => Err(StatementError::categorization(
                "AI client cannot block inside a current-thread runtime",
            )),
            Err(_) => self.runtime.block_on(self.complete(request)),
        }
    }
}
