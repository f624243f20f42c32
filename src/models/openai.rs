// Generic OpenAI-compatible hosted backend.
//
// Covers any endpoint speaking the chat-completions wire format (OpenAI
// itself, vLLM, llama.cpp servers, most gateways) — set OPENAI_BASE_URL
// to point elsewhere. Batching works like the Gemini path: one prompt
// per batch, JSON recovery on the way back.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::PipelineConfig;
use crate::models::batch::{Batch, BatchOutcome};
use crate::models::response::recover_batch;
use crate::models::traits::TextModel;
use crate::prompts;

/// Chat-completions-backed text model, one request per batch.
pub struct OpenAiCompatModel {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl OpenAiCompatModel {
    pub fn new(model: &str, config: &PipelineConfig) -> Result<Self> {
        config.require_openai()?;
        let client = reqwest::Client::builder()
            .user_agent("mollify/0.1 (text-detoxification)")
            .timeout(config.request_timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
            api_key: config.openai_api_key.clone(),
            model: model.to_string(),
            temperature: config.temperature,
        })
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to call chat-completions endpoint")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("Chat-completions endpoint returned {}: {}", status, body);
        }

        let envelope: ChatResponse = response
            .json()
            .await
            .context("Failed to parse chat-completions response")?;

        let text = envelope
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .unwrap_or_default();

        debug!(chars = text.len(), "Chat-completions reply received");
        Ok(text)
    }
}

#[async_trait]
impl TextModel for OpenAiCompatModel {
    async fn forward(&self, batch: &Batch) -> Result<BatchOutcome> {
        if batch.is_empty() {
            return Ok(BatchOutcome::Rewritten(Vec::new()));
        }

        let prompt = prompts::batch_prompt(
            batch.task,
            batch.language,
            batch.forced_target,
            &batch.units,
        )?;
        let raw = self.complete(&prompt).await?;
        Ok(recover_batch(&raw, &batch.originals()))
    }
}

// --- chat-completions request/response types ---

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_shape_matches_wire_format() {
        let request = ChatRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: "prompt".to_string(),
            }],
            temperature: 0.7,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "prompt");
    }

    #[test]
    fn response_extracts_first_choice() {
        let raw = r#"{"choices": [{"message": {"role": "assistant", "content": "[]"}}]}"#;
        let envelope: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(envelope.choices[0].message.content, "[]");
    }

    #[test]
    fn choiceless_response_parses_empty() {
        let envelope: ChatResponse = serde_json::from_str("{}").unwrap();
        assert!(envelope.choices.is_empty());
    }
}
