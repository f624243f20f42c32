// Backtranslation strategy — detoxify through a pivot language.
//
// Per language group the pipeline is fixed: translate into the pivot,
// hand the pivot-language text to a nested Detoxifier (any strategy,
// including another backtranslation layer), translate back. Each call is
// independent; nothing persists between calls.

use anyhow::{ensure, Result};
use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::detox::grouping::{finalize, gather, group_by_language, scatter};
use crate::detox::traits::Detoxifier;
use crate::lang::Language;
use crate::models::batch::{Batch, BatchOutcome};
use crate::models::registry::ModelRegistry;
use crate::models::traits::TextModel;
use crate::prompts::Task;

/// Detoxifier that routes text through a pivot language.
pub struct BacktranslationDetoxifier {
    translator: Box<dyn TextModel>,
    inner: Box<dyn Detoxifier>,
    config: PipelineConfig,
}

impl BacktranslationDetoxifier {
    /// Load the configured translator model and wrap `inner` as the
    /// pivot-language detoxifier.
    pub fn new(
        config: &PipelineConfig,
        registry: &ModelRegistry,
        inner: Box<dyn Detoxifier>,
    ) -> Result<Self> {
        info!("Loading translator model: {}", config.translator_model);
        let mut translator = registry.load(&config.translator_model, config)?;
        translator.move_to(config.device)?;
        Ok(Self {
            translator,
            inner,
            config: config.clone(),
        })
    }

    /// Wrap an already-constructed translator backend. Used by tests and
    /// by callers composing strategies by hand.
    pub fn with_translator(
        translator: Box<dyn TextModel>,
        inner: Box<dyn Detoxifier>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            translator,
            inner,
            config: config.clone(),
        }
    }

    /// Translate one language-homogeneous group, chunked by batch size.
    async fn translate(
        &self,
        texts: &[String],
        source: Language,
        target: Language,
    ) -> Result<Vec<String>> {
        let batches = Batch::build(
            texts,
            source,
            Task::Translation,
            Some(target),
            self.config.batch_size,
        );

        let mut outputs = Vec::with_capacity(texts.len());
        for batch in &batches {
            match self.translator.forward(batch).await? {
                BatchOutcome::Rewritten(texts) => outputs.extend(texts),
                BatchOutcome::FellBack { texts, reason } => {
                    warn!(
                        source = %source,
                        target = %target,
                        items = texts.len(),
                        reason = %reason,
                        "Translation batch fell back to original texts"
                    );
                    outputs.extend(texts);
                }
            }
        }
        ensure!(
            outputs.len() == texts.len(),
            "Translator returned {} outputs for {} inputs",
            outputs.len(),
            texts.len()
        );
        Ok(outputs)
    }

    /// The three-stage pipeline for one language group.
    async fn run_group(&self, texts: &[String], language: Language) -> Result<Vec<String>> {
        let pivot = self.config.pivot_language;

        let translated = self.translate(texts, language, pivot).await?;
        debug!(language = %language, pivot = %pivot, "Translated into pivot");

        let pivot_langs = vec![pivot; translated.len()];
        let detoxified = self.inner.detoxify_batch(&translated, &pivot_langs).await?;
        debug!(pivot = %pivot, "Detoxified on pivot");

        let back = self.translate(&detoxified, pivot, language).await?;
        debug!(language = %language, "Translated back from pivot");

        Ok(back)
    }
}

#[async_trait]
impl Detoxifier for BacktranslationDetoxifier {
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
