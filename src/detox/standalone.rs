// Standalone strategy — one model rewrites text directly in its source
// language. No pivoting, no nesting; this is also the strategy that sits
// at the bottom of every backtranslation stack.

use anyhow::{ensure, Result};
use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::detox::grouping::{finalize, gather, group_by_language, scatter};
use crate::detox::traits::Detoxifier;
use crate::lang::Language;
use crate::models::batch::{Batch, BatchOutcome};
use crate::models::registry::ModelRegistry;
use crate::models::traits::TextModel;
use crate::prompts::Task;

/// Detoxifier backed by a single rewriting model.
pub struct StandaloneDetoxifier {
    model: Box<dyn TextModel>,
    config: PipelineConfig,
}

impl StandaloneDetoxifier {
    /// Load the configured detoxifier model and move it to the configured
    /// device.
    pub fn new(config: &PipelineConfig, registry: &ModelRegistry) -> Result<Self> {
        info!("Loading detoxifier model: {}", config.detoxifier_model);
        let mut model = registry.load(&config.detoxifier_model, config)?;
        model.move_to(config.device)?;
        Ok(Self {
            model,
            config: config.clone(),
        })
    }

    /// Wrap an already-constructed backend. Used by tests and by callers
    /// composing strategies by hand.
    pub fn with_model(model: Box<dyn TextModel>, config: &PipelineConfig) -> Self {
        Self {
            model,
            config: config.clone(),
        }
    }

    /// One language group: chunk, prompt, forward, collect.
    async fn run_group(&self, texts: &[String], language: Language) -> Result<Vec<String>> {
        let batches = Batch::build(
            texts,
            language,
            Task::Detoxification,
            None,
            self.config.batch_size,
        );

        let mut outputs = Vec::with_capacity(texts.len());
        for batch in &batches {
            match self.model.forward(batch).await? {
                BatchOutcome::Rewritten(texts) => outputs.extend(texts),
                BatchOutcome::FellBack { texts, reason } => {
                    warn!(
                        language = %language,
                        items = texts.len(),
                        reason = %reason,
                        "Batch fell back to original texts"
                    );
                    outputs.extend(texts);
                }
            }
        }
        ensure!(
            outputs.len() == texts.len(),
            "Detoxifier model returned {} outputs for {} inputs",
            outputs.len(),
            texts.len()
        );
        Ok(outputs)
    }
}

#[async_trait]
impl Detoxifier for StandaloneDetoxifier {
    async fn detoxify_batch(
        &self,
        texts: &[String],
        languages: &[Language],
    ) -> Result<Vec<String>> {
        ensure!(
            texts.len() == languages.len(),
            "Got {} texts but {} language tags",
            texts.len(),
            languages.len()
        );

        let mut slots: Vec<Option<String>> = vec![None; texts.len()];
        for (language, indices) in group_by_language(languages) {
            let group_texts = gather(texts, &indices);
            let outputs = self.run_group(&group_texts, language).await?;
            scatter(&mut slots, &indices, outputs)?;
        }
        finalize(slots)
    }
}
