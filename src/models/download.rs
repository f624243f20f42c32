// Model artifact download helper.
//
// Local models are optimum-style ONNX exports fetched from HuggingFace
// resolve URLs. Each model gets its own subdirectory under the configured
// model dir (~/.local/share/mollify/models/ on Linux) so artifacts persist
// across runs and multiple models can coexist.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

/// Artifacts one seq2seq export consists of. The ONNX graphs live under
/// the repo's `onnx/` folder; tokenizer and config sit at the repo root.
pub const ENCODER_FILE: &str = "encoder_model.onnx";
pub const DECODER_FILE: &str = "decoder_model.onnx";
pub const TOKENIZER_FILE: &str = "tokenizer.json";
pub const CONFIG_FILE: &str = "config.json";

const REMOTE_FILES: [(&str, &str); 4] = [
    ("onnx/encoder_model.onnx", ENCODER_FILE),
    ("onnx/decoder_model.onnx", DECODER_FILE),
    (TOKENIZER_FILE, TOKENIZER_FILE),
    (CONFIG_FILE, CONFIG_FILE),
];

/// Subdirectory for one model under the base model dir. Slashes in the
/// repo path are flattened so "s-nlp/mt0-xl-detox-orpo" maps to a single
/// directory level.
pub fn local_model_dir(base: &Path, model_path: &str) -> PathBuf {
    base.join(model_path.replace('/', "--"))
}

/// Check whether every artifact of one export exists.
pub fn model_files_present(dir: &Path) -> bool {
    [ENCODER_FILE, DECODER_FILE, TOKENIZER_FILE, CONFIG_FILE]
        .iter()
        .all(|file| dir.join(file).exists())
}

/// Download all artifacts for one model repo into the model dir.
///
/// Shows progress bars for the large graph files. Skips files that
/// already exist. Creates directories as needed.
pub async fn download_model(base: &Path, model_path: &str) -> Result<()> {
    let dir = local_model_dir(base, model_path);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create model directory: {}", dir.display()))?;

    println!("\nModel {model_path}:");

    for (remote, local) in REMOTE_FILES {
        let dest = dir.join(local);
        if dest.exists() {
            info!(file = local, "Artifact already exists, skipping");
            println!("  {local} (already exists)");
            continue;
        }
        println!("  Downloading {local}...");
        let url = format!("https://huggingface.co/{model_path}/resolve/main/{remote}");
        let show_progress = local.ends_with(".onnx");
        download_file(&url, &dest, show_progress).await?;
    }

    Ok(())
}

/// Download a single file from a URL to a local path.
/// If `show_progress` is true, display a progress bar.
async fn download_file(url: &str, dest: &Path, show_progress: bool) -> Result<()> {
    let client = reqwest::Client::new();
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to download {}", url))?;

    if !response.status().is_success() {
        bail!("Download failed with status {}: {}", response.status(), url);
    }

    let total_size = response.content_length();

    let pb = if show_progress {
        let pb = if let Some(size) = total_size {
            let pb = ProgressBar::new(size);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("    [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
                    .expect("valid template")
                    .progress_chars("=> "),
            );
            pb
        } else {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("    {spinner} {bytes}")
                    .expect("valid template"),
            );
            pb
        };
        Some(pb)
    } else {
        None
    };

    let bytes = response
        .bytes()
        .await
        .context("Failed to read response body")?;

    if let Some(ref pb) = pb {
        pb.set_position(bytes.len() as u64);
    }

    std::fs::write(dest, &bytes).with_context(|| format!("Failed to write {}", dest.display()))?;

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    info!("Downloaded {} to {}", url, dest.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_model_dir_flattens_repo_path() {
        let base = PathBuf::from("/tmp/models");
        let dir = local_model_dir(&base, "s-nlp/mt0-xl-detox-orpo");
        assert_eq!(dir, base.join("s-nlp--mt0-xl-detox-orpo"));
    }

    #[test]
    fn model_files_present_false_when_empty() {
        let dir = std::env::temp_dir().join("mollify-test-nonexistent");
        assert!(!model_files_present(&dir));
    }

    #[test]
    fn model_files_present_true_when_all_files_exist() {
        let dir = std::env::temp_dir().join("mollify-download-test");
        std::fs::create_dir_all(&dir).unwrap();
        for file in [ENCODER_FILE, DECODER_FILE, TOKENIZER_FILE, CONFIG_FILE] {
            std::fs::write(dir.join(file), b"fake").unwrap();
        }

        assert!(model_files_present(&dir));

        // Cleanup
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn model_files_present_false_when_partial() {
        let dir = std::env::temp_dir().join("mollify-download-partial-test");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(TOKENIZER_FILE), b"fake").unwrap();

        assert!(!model_files_present(&dir));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
