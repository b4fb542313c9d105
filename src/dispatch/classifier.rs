use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::settings::Settings;

const TEMPERATURE: f64 = 0.3;
const REQUEST_TIMEOUT_SECS: u64 = 120;
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Turns a batch of formatted record lines into free text holding CSV rows.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, lines: &[String]) -> anyhow::Result<String>;
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// OpenAI-compatible chat completions client.
pub struct OpenAiClassifier {
    /// Pre-computed `"Bearer <key>"` header value.
    auth_header: String,
    endpoint: String,
    model: String,
    system_prompt: String,
    client: Client,
}

impl OpenAiClassifier {
    /// `None` when no API key is configured.
    pub fn from_settings(settings: &Settings) -> Option<Self> {
        let api_key = settings.api_key.trim();
        if api_key.is_empty() {
            return None;
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| Client::new());

        Some(Self {
            auth_header: format!("Bearer {api_key}"),
            endpoint: format!("{}/chat/completions", settings.base_url.trim_end_matches('/')),
            model: settings.model.clone(),
            system_prompt: settings.system_prompt.clone(),
            client,
        })
    }

    fn build_request(&self, lines: &[String]) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system",
                    content: self.system_prompt.clone(),
                },
                Message {
                    role: "user",
                    content: lines.join("\n"),
                },
            ],
            temperature: TEMPERATURE,
        }
    }

    fn extract_text(chat_response: ChatResponse) -> anyhow::Result<String> {
        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow::anyhow!("classifier returned no choices"))
    }
}

#[async_trait]
impl Classifier for OpenAiClassifier {
    async fn classify(&self, lines: &[String]) -> anyhow::Result<String> {
        let request = self.build_request(lines);

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", &self.auth_header)
            .json(&request)
            .send()
            .await
            .context("classifier request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("classifier returned {status}: {}", body.trim());
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .context("classifier response JSON decode failed")?;
        Self::extract_text(chat_response)
    }
}
