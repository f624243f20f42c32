// Provider dispatch for model identifiers.
//
// Identifiers look like "<provider>/<model-path>": the provider tag picks
// the adapter implementation and the rest is handed to it verbatim. The
// registry is populated explicitly at startup — this is the only place a
// provider tag is bound to a concrete backend, which is what lets the
// strategies stay agnostic to whether a role is served locally or by a
// hosted API.

use anyhow::{bail, Result};

use crate::config::PipelineConfig;
use crate::models::google::GoogleModel;
use crate::models::onnx::OnnxSeq2Seq;
use crate::models::openai::OpenAiCompatModel;
use crate::models::traits::TextModel;
use crate::models::yandex::YandexModel;

type Factory = fn(&str, &PipelineConfig) -> Result<Box<dyn TextModel>>;

/// Maps provider tags to adapter factories.
pub struct ModelRegistry {
    factories: Vec<(&'static str, Factory)>,
}

impl ModelRegistry {
    /// The built-in provider set. Construct once at startup and share.
    pub fn builtin() -> Self {
        let factories: Vec<(&'static str, Factory)> = vec![
            ("hf", |path, config| {
                Ok(Box::new(OnnxSeq2Seq::load(path, config)?))
            }),
            ("google", |path, config| {
                Ok(Box::new(GoogleModel::new(path, config)?))
            }),
            ("yandex", |path, config| {
                Ok(Box::new(YandexModel::new(path, config)?))
            }),
            ("api", |path, config| {
                Ok(Box::new(OpenAiCompatModel::new(path, config)?))
            }),
        ];
        Self { factories }
    }

    /// Known provider tags, in registration order.
    pub fn providers(&self) -> Vec<&'static str> {
        self.factories.iter().map(|(tag, _)| *tag).collect()
    }

    /// Resolve a model identifier to a loaded adapter.
    pub fn load(
        &self,
        identifier: &str,
        config: &PipelineConfig,
    ) -> Result<Box<dyn TextModel>> {
        let Some((provider, path)) = identifier.split_once('/') else {
            bail!(
                "Model identifier '{identifier}' must look like '<provider>/<model-path>' \
                 (e.g. 'hf/s-nlp/mt0-xl-detox-orpo')."
            );
        };

        for (tag, factory) in &self.factories {
            if *tag == provider {
                return factory(path, config);
            }
        }
        bail!(
            "Unknown model provider '{}' in '{}'. Known providers: {}",
            provider,
            identifier,
            self.providers().join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registers_expected_providers() {
        let registry = ModelRegistry::builtin();
        assert_eq!(registry.providers(), vec!["hf", "google", "yandex", "api"]);
    }

    #[test]
    fn unknown_provider_error_names_provider_and_known_set() {
        let registry = ModelRegistry::builtin();
        let config = PipelineConfig::default();
        let err = registry
            .load("openrouter/some-model", &config)
            .err()
            .unwrap()
            .to_string();
        assert!(
            err.contains("'openrouter'"),
            "error should name the provider: {err}"
        );
        for tag in registry.providers() {
            assert!(err.contains(tag), "error should list '{tag}': {err}");
        }
    }

    #[test]
    fn identifier_without_separator_is_rejected() {
        let registry = ModelRegistry::builtin();
        let config = PipelineConfig::default();
        let err = registry.load("not-an-identifier", &config).err().unwrap();
        assert!(err.to_string().contains("<provider>/<model-path>"));
    }

    #[test]
    fn hosted_provider_requires_credentials() {
        let registry = ModelRegistry::builtin();
        let config = PipelineConfig::default();
        // No GOOGLE_API_KEY in the default config — the factory must refuse.
        assert!(registry.load("google/gemini-2.0-flash", &config).is_err());
    }
}
