// Local seq2seq generation via ONNX Runtime.
//
// Runs optimum-style encoder/decoder exports (MT0-class detoxifiers,
// NLLB-class translators) entirely on the local machine — no API calls,
// no rate limits, no network dependency. Generation honors the configured
// knobs: greedy decoding, beam search, or temperature/top-p sampling.
//
// Translation batches constrain the first generated token to the target
// language tag, which is how NLLB-family models select their output
// language.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use ort::session::Session;
use ort::value::Tensor;
use rand::Rng;
use serde::Deserialize;
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use crate::config::{Device, PipelineConfig};
use crate::models::batch::{Batch, BatchOutcome};
use crate::models::download::{
    local_model_dir, model_files_present, CONFIG_FILE, DECODER_FILE, ENCODER_FILE, TOKENIZER_FILE,
};
use crate::models::traits::TextModel;
use crate::prompts::Task;

/// Local ONNX-based seq2seq backend. Sessions and tokenizer sit behind
/// Arc so generation can be offloaded to spawn_blocking without blocking
/// the async runtime.
pub struct OnnxSeq2Seq {
    // Arc+Mutex because:
    // 1. ort::Session::run takes &mut self, so we need interior mutability
    // 2. spawn_blocking requires 'static, so we need Arc for shared ownership
    // 3. We need Send+Sync for the TextModel trait
    // Generation is CPU-bound and batch-sequential, so contention is nil.
    encoder: Arc<Mutex<Session>>,
    decoder: Arc<Mutex<Session>>,
    tokenizer: Arc<Tokenizer>,
    params: GenerationParams,
    device: Device,
    encoder_path: PathBuf,
    decoder_path: PathBuf,
}

/// Scalar generation settings, resolved once at load time.
#[derive(Debug, Clone, Copy)]
struct GenerationParams {
    max_length: usize,
    num_beams: usize,
    temperature: f32,
    top_p: f32,
    do_sample: bool,
    decoder_start: u32,
    eos: u32,
}

/// The slice of the exported config.json we care about. T5-family models
/// decode from the pad token, NLLB-family from </s> — the export records
/// which.
#[derive(Debug, Deserialize)]
struct ExportConfig {
    decoder_start_token_id: Option<u32>,
    eos_token_id: Option<u32>,
    pad_token_id: Option<u32>,
}

impl OnnxSeq2Seq {
    /// Load an exported model from the configured model directory.
    ///
    /// Expects `encoder_model.onnx`, `decoder_model.onnx`, `tokenizer.json`
    /// and `config.json` under the model's subdirectory. Run
    /// `mollify download-model` first if they are missing.
    pub fn load(model_path: &str, config: &PipelineConfig) -> Result<Self> {
        let dir = local_model_dir(&config.model_dir, model_path);
        if !model_files_present(&dir) {
            bail!(
                "Model files for '{}' not found in {}\nRun `mollify download-model` to fetch them.",
                model_path,
                dir.display()
            );
        }

        let encoder_path = dir.join(ENCODER_FILE);
        let decoder_path = dir.join(DECODER_FILE);
        let encoder = build_session(&encoder_path, config.device)?;
        let decoder = build_session(&decoder_path, config.device)?;

        let tokenizer = Tokenizer::from_file(dir.join(TOKENIZER_FILE))
            .map_err(|e| anyhow!("Failed to load tokenizer: {e}"))?;

        let export_path = dir.join(CONFIG_FILE);
        let export_bytes = std::fs::read(&export_path)
            .with_context(|| format!("Failed to read {}", export_path.display()))?;
        let export: ExportConfig = serde_json::from_slice(&export_bytes)
            .with_context(|| format!("Failed to parse {}", export_path.display()))?;

        let eos = export
            .eos_token_id
            .or_else(|| tokenizer.token_to_id("</s>"))
            .unwrap_or(1);
        let decoder_start = export
            .decoder_start_token_id
            .or(export.pad_token_id)
            .or_else(|| tokenizer.token_to_id("<pad>"))
            .unwrap_or(0);

        info!(model = model_path, "Loaded ONNX seq2seq model from {}", dir.display());

        Ok(Self {
            encoder: Arc::new(Mutex::new(encoder)),
            decoder: Arc::new(Mutex::new(decoder)),
            tokenizer: Arc::new(tokenizer),
            params: GenerationParams {
                max_length: config.max_length,
                num_beams: config.num_beams,
                temperature: config.temperature,
                top_p: config.top_p,
                do_sample: config.do_sample,
                decoder_start,
                eos,
            },
            device: config.device,
            encoder_path,
            decoder_path,
        })
    }

    /// Vocabulary id of a target-language tag, for the forced first token.
    fn lang_token_id(&self, tag: &str) -> Result<u32> {
        self.tokenizer.token_to_id(tag).ok_or_else(|| {
            anyhow!(
                "Translation tag '{tag}' is not in the tokenizer vocabulary — \
                 is the configured translator a translation model?"
            )
        })
    }
}

#[async_trait]
impl TextModel for OnnxSeq2Seq {
    async fn forward(&self, batch: &Batch) -> Result<BatchOutcome> {
        if batch.is_empty() {
            return Ok(BatchOutcome::Rewritten(Vec::new()));
        }

        // Translation feeds raw source text (language selection happens via
        // tags, not instructions); detoxification feeds the per-item prompt.
        let inputs: Vec<String> = match batch.task {
            Task::Translation => batch.originals(),
            Task::Detoxification => batch.units.iter().map(|u| u.prompted.clone()).collect(),
        };

        let source_tag = match batch.task {
            Task::Translation => Some(batch.language.translation_code()),
            Task::Detoxification => None,
        };
        let forced_token = match batch.forced_target {
            Some(target) => Some(self.lang_token_id(target.translation_code())?),
            None => None,
        };

        debug!(
            task = ?batch.task,
            language = %batch.language,
            items = inputs.len(),
            "Running local generation"
        );

        // Clone Arc handles for the spawn_blocking closure ('static requirement)
        let encoder = Arc::clone(&self.encoder);
        let decoder = Arc::clone(&self.decoder);
        let tokenizer = Arc::clone(&self.tokenizer);
        let params = self.params;

        // Offload all CPU-bound work (tokenization + generation) to a
        // blocking thread so the async runtime stays responsive.
        let texts = tokio::task::spawn_blocking(move || {
            let mut outputs = Vec::with_capacity(inputs.len());
            for text in &inputs {
                outputs.push(generate(
                    &encoder,
                    &decoder,
                    &tokenizer,
                    &params,
                    text,
                    source_tag,
                    forced_token,
                )?);
            }
            Ok::<_, anyhow::Error>(outputs)
        })
        .await
        .context("spawn_blocking panicked")??;

        Ok(BatchOutcome::Rewritten(texts))
    }

    fn move_to(&mut self, device: Device) -> Result<()> {
        if device == self.device {
            return Ok(());
        }
        info!(?device, "Rebuilding ONNX sessions for new device");
        self.encoder = Arc::new(Mutex::new(build_session(&self.encoder_path, device)?));
        self.decoder = Arc::new(Mutex::new(build_session(&self.decoder_path, device)?));
        self.device = device;
        Ok(())
    }
}

/// Build one ONNX session against the requested device. CUDA needs the
/// `cuda` cargo feature; without it the session falls back to CPU.
fn build_session(path: &Path, device: Device) -> Result<Session> {
    let mut builder = Session::builder().context("Failed to create ONNX session builder")?;

    #[cfg(feature = "cuda")]
    let mut builder = match device {
        Device::Cuda(index) => builder
            .with_execution_providers([
                ort::execution_providers::CUDAExecutionProvider::default()
                    .with_device_id(index as i32)
                    .build(),
            ])
            .context("Failed to register CUDA execution provider")?,
        Device::Cpu => builder,
    };

    if cfg!(not(feature = "cuda")) && matches!(device, Device::Cuda(_)) {
        warn!("Built without the `cuda` feature; running on CPU instead");
    }

    builder
        .commit_from_file(path)
        .with_context(|| format!("Failed to load ONNX model from {}", path.display()))
}

/// Encoder output for one input, kept as a flat buffer so it can be
/// re-fed (and repeated across beams) on every decoder step.
struct EncoderStates {
    data: Vec<f32>,
    src_len: usize,
    hidden_size: usize,
}

/// Encode one input and decode per the generation params.
fn generate(
    encoder: &Mutex<Session>,
    decoder: &Mutex<Session>,
    tokenizer: &Tokenizer,
    params: &GenerationParams,
    text: &str,
    source_tag: Option<&'static str>,
    forced_token: Option<u32>,
) -> Result<String> {
    let encoding = tokenizer
        .encode(text, true)
        .map_err(|e| anyhow!("Tokenization failed: {e}"))?;

    // NLLB expects the source language tag as the first token.
    let mut ids: Vec<i64> = Vec::with_capacity(encoding.get_ids().len() + 1);
    if let Some(tag) = source_tag {
        if let Some(id) = tokenizer.token_to_id(tag) {
            ids.push(id as i64);
        }
    }
    ids.extend(encoding.get_ids().iter().map(|&id| id as i64));
    ids.truncate(params.max_length);
    let src_len = ids.len();
    let src_mask: Vec<i64> = vec![1; src_len];

    let states = {
        let mut encoder = encoder
            .lock()
            .map_err(|e| anyhow!("Encoder session lock poisoned: {e}"))?;

        let input_ids = Tensor::from_array(([1i64, src_len as i64], ids))
            .context("Failed to create input_ids tensor")?;
        let attention_mask = Tensor::from_array(([1i64, src_len as i64], src_mask.clone()))
            .context("Failed to create attention_mask tensor")?;

        let outputs = encoder
            .run(ort::inputs! {
                "input_ids" => input_ids,
                "attention_mask" => attention_mask
            })
            .context("Encoder inference failed")?;

        // Output shape: [1, src_len, hidden]
        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .context("Failed to extract encoder hidden states")?;
        EncoderStates {
            hidden_size: shape[2] as usize,
            src_len,
            data: data.to_vec(),
        }
    };

    let mut prefix = vec![params.decoder_start];
    if let Some(forced) = forced_token {
        prefix.push(forced);
    }

    let generated = if params.do_sample {
        decode_sampling(decoder, &states, &src_mask, params, prefix)?
    } else if params.num_beams > 1 {
        decode_beam(decoder, &states, &src_mask, params, prefix)?
    } else {
        decode_greedy(decoder, &states, &src_mask, params, prefix)?
    };

    // Special tokens (start, EOS, language tags) are dropped here.
    tokenizer
        .decode(&generated, true)
        .map_err(|e| anyhow!("Detokenization failed: {e}"))
}

/// Run one decoder pass over `prefixes` (all the same length) and return
/// next-token logits for each. The prefix dimension rides the batch
/// dimension, which is what makes lockstep beam search one call per step.
fn decoder_step(
    decoder: &Mutex<Session>,
    states: &EncoderStates,
    src_mask: &[i64],
    prefixes: &[Vec<u32>],
) -> Result<Vec<Vec<f32>>> {
    let n = prefixes.len();
    let tgt_len = prefixes[0].len();

    let mut ids_flat: Vec<i64> = Vec::with_capacity(n * tgt_len);
    for prefix in prefixes {
        ids_flat.extend(prefix.iter().map(|&t| t as i64));
    }
    let mut hidden_flat: Vec<f32> = Vec::with_capacity(n * states.data.len());
    let mut mask_flat: Vec<i64> = Vec::with_capacity(n * src_mask.len());
    for _ in 0..n {
        hidden_flat.extend_from_slice(&states.data);
        mask_flat.extend_from_slice(src_mask);
    }

    let input_ids = Tensor::from_array(([n as i64, tgt_len as i64], ids_flat))
        .context("Failed to create decoder input_ids tensor")?;
    let encoder_hidden = Tensor::from_array((
        [n as i64, states.src_len as i64, states.hidden_size as i64],
        hidden_flat,
    ))
    .context("Failed to create encoder_hidden_states tensor")?;
    let encoder_mask = Tensor::from_array(([n as i64, states.src_len as i64], mask_flat))
        .context("Failed to create encoder_attention_mask tensor")?;

    let mut decoder = decoder
        .lock()
        .map_err(|e| anyhow!("Decoder session lock poisoned: {e}"))?;
    let outputs = decoder
        .run(ort::inputs! {
            "input_ids" => input_ids,
            "encoder_attention_mask" => encoder_mask,
            "encoder_hidden_states" => encoder_hidden
        })
        .context("Decoder inference failed")?;

    // Output shape: [n, tgt_len, vocab] — we want the last position per row.
    let (shape, data) = outputs[0]
        .try_extract_tensor::<f32>()
        .context("Failed to extract decoder logits")?;
    let vocab = shape[2] as usize;

    let mut result = Vec::with_capacity(n);
    for row in 0..n {
        let offset = (row * tgt_len + (tgt_len - 1)) * vocab;
        result.push(data[offset..offset + vocab].to_vec());
    }
    Ok(result)
}

fn decode_greedy(
    decoder: &Mutex<Session>,
    states: &EncoderStates,
    src_mask: &[i64],
    params: &GenerationParams,
    mut prefix: Vec<u32>,
) -> Result<Vec<u32>> {
    for _ in 0..params.max_length {
        let logits = decoder_step(decoder, states, src_mask, std::slice::from_ref(&prefix))?;
        let next = argmax(&logits[0]);
        prefix.push(next);
        if next == params.eos {
            break;
        }
    }
    Ok(prefix)
}

fn decode_sampling(
    decoder: &Mutex<Session>,
    states: &EncoderStates,
    src_mask: &[i64],
    params: &GenerationParams,
    mut prefix: Vec<u32>,
) -> Result<Vec<u32>> {
    let mut rng = rand::rng();
    for _ in 0..params.max_length {
        let logits = decoder_step(decoder, states, src_mask, std::slice::from_ref(&prefix))?;
        let probs = softmax(&logits[0], params.temperature);
        let next = sample_top_p(&probs, params.top_p, &mut rng);
        prefix.push(next);
        if next == params.eos {
            break;
        }
    }
    Ok(prefix)
}

fn decode_beam(
    decoder: &Mutex<Session>,
    states: &EncoderStates,
    src_mask: &[i64],
    params: &GenerationParams,
    prefix: Vec<u32>,
) -> Result<Vec<u32>> {
    let mut beams: Vec<(Vec<u32>, f32)> = vec![(prefix, 0.0)];
    let mut finished: Vec<(Vec<u32>, f32)> = Vec::new();

    for _ in 0..params.max_length {
        let prefixes: Vec<Vec<u32>> = beams.iter().map(|(p, _)| p.clone()).collect();
        let all_logits = decoder_step(decoder, states, src_mask, &prefixes)?;

        let mut candidates: Vec<(Vec<u32>, f32)> = Vec::new();
        for ((prefix, score), logits) in beams.iter().zip(&all_logits) {
            let log_probs = log_softmax(logits);
            for (token, lp) in top_k(&log_probs, params.num_beams) {
                let mut extended = prefix.clone();
                extended.push(token);
                candidates.push((extended, score + lp));
            }
        }
        candidates.sort_by(|a, b| b.1.total_cmp(&a.1));
        candidates.truncate(params.num_beams);

        beams = Vec::new();
        for (seq, score) in candidates {
            if seq.last().copied() == Some(params.eos) {
                finished.push((seq, score));
            } else {
                beams.push((seq, score));
            }
        }
        if beams.is_empty() || finished.len() >= params.num_beams {
            break;
        }
    }
    finished.extend(beams);

    // Length-normalized score picks the winner, so short sequences don't
    // dominate just by accumulating fewer log-probs.
    finished
        .into_iter()
        .max_by(|a, b| {
            (a.1 / a.0.len() as f32).total_cmp(&(b.1 / b.0.len() as f32))
        })
        .map(|(seq, _)| seq)
        .ok_or_else(|| anyhow!("Beam search produced no sequences"))
}

fn argmax(logits: &[f32]) -> u32 {
    logits
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i as u32)
        .unwrap_or(0)
}

/// Temperature-scaled softmax.
fn softmax(logits: &[f32], temperature: f32) -> Vec<f32> {
    let t = if temperature > 0.0 { temperature } else { 1.0 };
    let max = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exp: Vec<f32> = logits.iter().map(|&l| ((l - max) / t).exp()).collect();
    let sum: f32 = exp.iter().sum();
    exp.iter().map(|&e| e / sum).collect()
}

fn log_softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let log_sum = logits
        .iter()
        .map(|&l| (l - max).exp())
        .sum::<f32>()
        .ln();
    logits.iter().map(|&l| l - max - log_sum).collect()
}

fn top_k(log_probs: &[f32], k: usize) -> Vec<(u32, f32)> {
    let mut indexed: Vec<(u32, f32)> = log_probs
        .iter()
        .cloned()
        .enumerate()
        .map(|(i, p)| (i as u32, p))
        .collect();
    indexed.sort_by(|a, b| b.1.total_cmp(&a.1));
    indexed.truncate(k.max(1));
    indexed
}

/// How many of the sorted-descending probabilities make up the nucleus.
fn nucleus_cutoff(sorted_probs: &[f32], top_p: f32) -> usize {
    let mut cumulative = 0.0;
    for (i, p) in sorted_probs.iter().enumerate() {
        cumulative += p;
        if cumulative >= top_p {
            return i + 1;
        }
    }
    sorted_probs.len()
}

/// Nucleus sampling: restrict to the smallest probability mass >= top_p,
/// then draw proportionally from it.
fn sample_top_p(probs: &[f32], top_p: f32, rng: &mut impl Rng) -> u32 {
    let mut indexed: Vec<(usize, f32)> = probs.iter().cloned().enumerate().collect();
    indexed.sort_by(|a, b| b.1.total_cmp(&a.1));

    let sorted_probs: Vec<f32> = indexed.iter().map(|(_, p)| *p).collect();
    let cut = nucleus_cutoff(&sorted_probs, top_p);
    let nucleus = &indexed[..cut];

    let mass: f32 = nucleus.iter().map(|(_, p)| p).sum();
    let mut draw = rng.random::<f32>() * mass;
    for (idx, p) in nucleus {
        draw -= p;
        if draw <= 0.0 {
            return *idx as u32;
        }
    }
    nucleus.last().map(|(i, _)| *i as u32).unwrap_or(0)
}
