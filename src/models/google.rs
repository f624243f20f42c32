// Gemini-class hosted backend.
//
// The whole batch is serialized into one prompt listing every item by
// ordinal ID; the model is asked to answer with the same JSON shape. The
// input is toxic by task definition, so every safety category is set to
// minimum blocking — otherwise the API refuses the very texts the
// pipeline exists to clean.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::PipelineConfig;
use crate::models::batch::{Batch, BatchOutcome};
use crate::models::response::recover_batch;
use crate::models::traits::TextModel;
use crate::prompts;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Safety categories that must not block detoxification input.
const SAFETY_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

/// Gemini-backed text model, one request per batch.
pub struct GoogleModel {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl GoogleModel {
    pub fn new(model: &str, config: &PipelineConfig) -> Result<Self> {
        config.require_google()?;
        let client = reqwest::Client::builder()
            .user_agent("mollify/0.1 (text-detoxification)")
            .timeout(config.request_timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_key: config.google_api_key.clone(),
            model: model.to_string(),
        })
    }

    /// One generateContent call. Transport and HTTP failures escalate;
    /// everything about the *content* of the reply is the caller's problem.
    async fn generate(&self, prompt: &str) -> Result<GenerateOutcome> {
        let url = format!(
            "{}/{}:generateContent?key={}",
            API_BASE, self.model, self.api_key
        );

        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            safety_settings: SAFETY_CATEGORIES
                .iter()
                .map(|category| SafetySetting {
                    category: category.to_string(),
                    threshold: "BLOCK_NONE".to_string(),
                })
                .collect(),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Failed to call Gemini API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("Gemini API returned {}: {}", status, body);
        }

        // A reply that arrives but doesn't carry text (blocked candidate,
        // unexpected envelope) is a content failure, not a transport one.
        let envelope: GenerateContentResponse = match response.json().await {
            Ok(envelope) => envelope,
            Err(e) => return Ok(GenerateOutcome::Unusable(format!("unreadable envelope: {e}"))),
        };

        let text: String = match envelope.candidates.first() {
            Some(candidate) => candidate
                .content
                .parts
                .iter()
                .map(|part| part.text.as_str())
                .collect(),
            None => return Ok(GenerateOutcome::Unusable("no candidates in reply".to_string())),
        };

        debug!(chars = text.len(), "Gemini reply received");
        Ok(GenerateOutcome::Text(text))
    }
}

enum GenerateOutcome {
    Text(String),
    Unusable(String),
}

#[async_trait]
impl TextModel for GoogleModel {
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
        let originals = batch.originals();

        match self.generate(&prompt).await? {
            GenerateOutcome::Text(raw) => Ok(recover_batch(&raw, &originals)),
            GenerateOutcome::Unusable(reason) => Ok(BatchOutcome::FellBack {
                texts: originals,
                reason,
            }),
        }
    }
}

// --- Gemini request/response types ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    safety_settings: Vec<SafetySetting>,
}

#[derive(Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
struct SafetySetting {
    category: String,
    threshold: String,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Content,
}
