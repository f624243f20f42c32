// YandexGPT-class hosted backend.
//
// Unlike the Gemini path this API is called once per item, with the
// per-item prompt as the user message. The reply text is the rewrite —
// no JSON recovery involved. The payload is encoded to UTF-8 bytes
// explicitly so Cyrillic never depends on a transport default.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::config::PipelineConfig;
use crate::models::batch::{Batch, BatchOutcome};
use crate::models::traits::TextModel;

const COMPLETION_URL: &str = "https://llm.api.cloud.yandex.net/foundationModels/v1/completion";

const SYSTEM_ROLE: &str = "Ты — умный ассистент.";

/// YandexGPT-backed text model, one request per item.
pub struct YandexModel {
    client: reqwest::Client,
    api_key: String,
    folder_id: String,
    model: String,
}

impl YandexModel {
    pub fn new(model: &str, config: &PipelineConfig) -> Result<Self> {
        config.require_yandex()?;
        let client = reqwest::Client::builder()
            .user_agent("mollify/0.1 (text-detoxification)")
            .timeout(config.request_timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_key: config.yandex_api_key.clone(),
            folder_id: config.yandex_folder_id.clone(),
            model: model.to_string(),
        })
    }

    /// One completion call for one prompt.
    async fn invoke(&self, user_text: &str) -> Result<String> {
        let payload = json!({
            "modelUri": format!("gpt://{}/{}", self.folder_id, self.model),
            "completionOptions": {
                "stream": false,
                "temperature": 0.6,
                "maxTokens": 1000,
            },
            "messages": [
                { "role": "system", "text": SYSTEM_ROLE },
                { "role": "user", "text": user_text },
            ],
        });

        // Explicit UTF-8 body instead of .json() so the charset is pinned.
        let body = serde_json::to_vec(&payload).context("Failed to encode request payload")?;

        let response = self
            .client
            .post(COMPLETION_URL)
            .header("Content-Type", "application/json; charset=utf-8")
            .header("Authorization", format!("Api-Key {}", self.api_key))
            .header("x-folder-id", self.folder_id.clone())
            .body(body)
            .send()
            .await
            .context("Failed to call YandexGPT API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("YandexGPT API returned {}: {}", status, body);
        }

        let envelope: serde_json::Value = response
            .json()
            .await
            .context("Failed to parse YandexGPT response")?;

        envelope["result"]["alternatives"][0]["message"]["text"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                anyhow::anyhow!("YandexGPT response carried no message text: {envelope}")
            })
    }
}

#[async_trait]
impl TextModel for YandexModel {
    async fn forward(&self, batch: &Batch) -> Result<BatchOutcome> {
        let mut texts = Vec::with_capacity(batch.len());
        for unit in &batch.units {
            let rewritten = self.invoke(&unit.prompted).await?;
            debug!(chars = rewritten.len(), "YandexGPT reply received");
            texts.push(rewritten);
        }
        Ok(BatchOutcome::Rewritten(texts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_pins_model_uri_and_roles() {
        let payload = json!({
            "modelUri": format!("gpt://{}/{}", "folder123", "yandexgpt-lite"),
            "completionOptions": { "stream": false, "temperature": 0.6, "maxTokens": 1000 },
            "messages": [
                { "role": "system", "text": SYSTEM_ROLE },
                { "role": "user", "text": "привет" },
            ],
        });

        assert_eq!(payload["modelUri"], "gpt://folder123/yandexgpt-lite");
        assert_eq!(payload["messages"][0]["role"], "system");
        assert_eq!(payload["messages"][1]["text"], "привет");
        // UTF-8 passes through byte encoding intact
        let bytes = serde_json::to_vec(&payload).unwrap();
        let round_trip: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(round_trip["messages"][1]["text"], "привет");
    }

    #[test]
    fn reply_text_extraction_path() {
        let envelope = json!({
            "result": { "alternatives": [ { "message": { "role": "assistant", "text": "clean" } } ] }
        });
        let text = envelope["result"]["alternatives"][0]["message"]["text"]
            .as_str()
            .unwrap();
        assert_eq!(text, "clean");
    }
}
