//! OpenAI chat-completions backend for narrative generation.

use async_trait::async_trait;
use nc_analyzer_core::narrative::GenerativeBackend;
use nc_analyzer_core::{NcError, NcResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{Credential, GenerationConfig};

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completions client. One request per narrative; no retries.
pub struct OpenAIChat {
    model: String,
    temperature: f64,
    max_tokens: u32,
    base_url: String,
    api_key: Credential,
    client: reqwest::Client,
}

impl OpenAIChat {
    pub fn new(config: &GenerationConfig, api_key: Credential) -> NcResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| NcError::Generation(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl GenerativeBackend for OpenAIChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system: &str, prompt: &str) -> NcResult<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(self.chat_url())
            .header("Authorization", format!("Bearer {}", self.api_key.expose()))
            .json(&request)
            .send()
            .await
            .map_err(|e| NcError::Generation(format!("chat request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NcError::Generation(format!(
                "chat API error {}: {}",
                status, body
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| NcError::Generation(format!("invalid chat response: {}", e)))?;

        first_content(parsed)
    }
}

fn first_content(response: ChatResponse) -> NcResult<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| NcError::Generation("chat response had no content".into()))
}

/// Build the generative backend when generation is enabled and a key exists.
pub fn create_generator(
    config: &GenerationConfig,
    credential: Option<&Credential>,
) -> NcResult<Option<Box<dyn GenerativeBackend>>> {
    match credential {
        Some(key) if config.enabled => Ok(Some(Box::new(OpenAIChat::new(config, key.clone())?))),
        _ => Ok(None),
    }
}
