use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::lang::Language;

/// Execution device for local generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    /// CPU execution (default) — works everywhere, no extra setup
    Cpu,
    /// CUDA execution provider with a device index — requires the `cuda` feature
    Cuda(u32),
}

impl FromStr for Device {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cpu" => Ok(Device::Cpu),
            "cuda" => Ok(Device::Cuda(0)),
            other => {
                if let Some(idx) = other.strip_prefix("cuda:") {
                    let idx: u32 = idx
                        .parse()
                        .with_context(|| format!("Invalid CUDA device index in '{other}'"))?;
                    return Ok(Device::Cuda(idx));
                }
                bail!("Unknown device '{other}'. Expected 'cpu', 'cuda', or 'cuda:<index>'.")
            }
        }
    }
}

/// Central pipeline configuration: model identifiers, generation knobs,
/// execution device, and API credentials.
///
/// Built once per run and never mutated afterwards — strategies and
/// adapters hold read-only copies. All secrets come from env vars (never
/// hardcoded); the .env file is loaded automatically at startup via dotenvy.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Detoxification model identifier, `<provider>/<model-path>`.
    pub detoxifier_model: String,
    /// Translation model identifier, `<provider>/<model-path>`.
    pub translator_model: String,

    /// Maximum generated sequence length (tokens).
    pub max_length: usize,
    /// Items per model call.
    pub batch_size: usize,
    /// Beam count for local generation; 1 disables beam search.
    pub num_beams: usize,
    /// Sampling temperature, used when `do_sample` is set.
    pub temperature: f32,
    /// Nucleus sampling cutoff, used when `do_sample` is set.
    pub top_p: f32,
    /// Sample instead of deterministic search.
    pub do_sample: bool,

    /// Toxicity cutoff for downstream filtering. Part of the pipeline
    /// contract but not consulted by the core; carried for callers that
    /// post-process results.
    #[allow(dead_code)]
    pub toxicity_threshold: f32,
    /// Similarity cutoff, reserved like `toxicity_threshold`.
    #[allow(dead_code)]
    pub similarity_threshold: f32,

    /// Intermediary language for backtranslation.
    pub pivot_language: Language,
    /// Device for local model execution.
    pub device: Device,
    /// Directory holding downloaded ONNX model artifacts.
    pub model_dir: PathBuf,
    /// Timeout for one hosted-API request.
    pub request_timeout: Duration,

    /// Gemini API key (GOOGLE_API_KEY).
    pub google_api_key: String,
    /// YandexGPT API key (YANDEX_API_KEY).
    pub yandex_api_key: String,
    /// Yandex Cloud folder id (YANDEX_FOLDER_ID).
    pub yandex_folder_id: String,
    /// Key for OpenAI-compatible endpoints (OPENAI_API_KEY).
    pub openai_api_key: String,
    /// Base URL for OpenAI-compatible endpoints (OPENAI_BASE_URL).
    pub openai_base_url: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            detoxifier_model: "hf/s-nlp/mt0-xl-detox-orpo".to_string(),
            translator_model: "hf/facebook/nllb-200-distilled-600M".to_string(),
            max_length: 256,
            batch_size: 8,
            num_beams: 4,
            temperature: 0.7,
            top_p: 0.9,
            do_sample: false,
            toxicity_threshold: 0.5,
            similarity_threshold: 0.7,
            pivot_language: Language::English,
            device: Device::Cpu,
            model_dir: default_model_dir(),
            request_timeout: Duration::from_secs(60),
            google_api_key: String::new(),
            yandex_api_key: String::new(),
            yandex_folder_id: String::new(),
            openai_api_key: String::new(),
            openai_base_url: "https://api.openai.com".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration: defaults overridden by environment variables.
    ///
    /// Model identifiers and generation knobs have working defaults — only
    /// the hosted-API credentials are genuinely required, and only when a
    /// hosted provider is selected (checked via the `require_*` helpers).
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(id) = env::var("MOLLIFY_DETOXIFIER") {
            config.detoxifier_model = id;
        }
        if let Ok(id) = env::var("MOLLIFY_TRANSLATOR") {
            config.translator_model = id;
        }
        if let Ok(dir) = env::var("MOLLIFY_MODEL_DIR") {
            config.model_dir = PathBuf::from(dir);
        }
        if let Ok(device) = env::var("MOLLIFY_DEVICE") {
            config.device = device
                .parse()
                .context("Invalid MOLLIFY_DEVICE setting")?;
        }
        if let Ok(pivot) = env::var("MOLLIFY_PIVOT") {
            config.pivot_language = pivot
                .parse()
                .context("Invalid MOLLIFY_PIVOT setting")?;
        }

        config.google_api_key = env::var("GOOGLE_API_KEY").unwrap_or_default();
        config.yandex_api_key = env::var("YANDEX_API_KEY").unwrap_or_default();
        config.yandex_folder_id = env::var("YANDEX_FOLDER_ID").unwrap_or_default();
        config.openai_api_key = env::var("OPENAI_API_KEY").unwrap_or_default();
        if let Ok(url) = env::var("OPENAI_BASE_URL") {
            config.openai_base_url = url;
        }

        Ok(config)
    }

    /// Check that the Gemini API key is configured.
    /// Call this before constructing a `google/...` model.
    pub fn require_google(&self) -> Result<()> {
        if self.google_api_key.is_empty() {
            bail!(
                "GOOGLE_API_KEY not set. Add it to your .env file.\n\
                 See .env.example for the required variables."
            );
        }
        Ok(())
    }

    /// Check that YandexGPT credentials are configured.
    /// Call this before constructing a `yandex/...` model.
    pub fn require_yandex(&self) -> Result<()> {
        if self.yandex_api_key.is_empty() || self.yandex_folder_id.is_empty() {
            bail!(
                "YANDEX_API_KEY or YANDEX_FOLDER_ID not set. Add both to your .env file.\n\
                 See .env.example for the required variables."
            );
        }
        Ok(())
    }

    /// Check that OpenAI-compatible credentials are configured.
    /// Call this before constructing an `api/...` model.
    pub fn require_openai(&self) -> Result<()> {
        if self.openai_api_key.is_empty() {
            bail!(
                "OPENAI_API_KEY not set. Add it to your .env file.\n\
                 See .env.example for the required variables."
            );
        }
        Ok(())
    }
}

/// Returns the default directory for storing model files.
/// Uses the platform data directory: ~/.local/share/mollify/models/ on Linux.
pub fn default_model_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mollify")
        .join("models")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_models() {
        let config = PipelineConfig::default();
        assert_eq!(config.detoxifier_model, "hf/s-nlp/mt0-xl-detox-orpo");
        assert_eq!(config.translator_model, "hf/facebook/nllb-200-distilled-600M");
        assert_eq!(config.batch_size, 8);
        assert_eq!(config.num_beams, 4);
        assert!(!config.do_sample);
        assert_eq!(config.pivot_language, Language::English);
    }

    #[test]
    fn device_parses_cpu_and_cuda() {
        assert_eq!("cpu".parse::<Device>().unwrap(), Device::Cpu);
        assert_eq!("cuda".parse::<Device>().unwrap(), Device::Cuda(0));
        assert_eq!("cuda:1".parse::<Device>().unwrap(), Device::Cuda(1));
    }

    #[test]
    fn device_rejects_unknown_strings() {
        let err = "tpu".parse::<Device>().unwrap_err().to_string();
        assert!(err.contains("'tpu'"), "error should name the device: {err}");
        assert!("cuda:x".parse::<Device>().is_err());
    }

    #[test]
    fn default_model_dir_is_under_mollify() {
        let dir = default_model_dir();
        let path_str = dir.to_string_lossy();
        assert!(
            path_str.contains("mollify") && path_str.contains("models"),
            "Expected path containing mollify/models, got: {path_str}"
        );
    }

    #[test]
    fn require_helpers_flag_missing_credentials() {
        let config = PipelineConfig::default();
        assert!(config.require_google().is_err());
        assert!(config.require_yandex().is_err());
        assert!(config.require_openai().is_err());

        let mut with_keys = PipelineConfig::default();
        with_keys.google_api_key = "key".to_string();
        with_keys.yandex_api_key = "key".to_string();
        with_keys.yandex_folder_id = "folder".to_string();
        with_keys.openai_api_key = "key".to_string();
        assert!(with_keys.require_google().is_ok());
        assert!(with_keys.require_yandex().is_ok());
        assert!(with_keys.require_openai().is_ok());
    }
}
