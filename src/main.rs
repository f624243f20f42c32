use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;
use tracing::info;

use mollify::config::PipelineConfig;
use mollify::detox::backtranslation::BacktranslationDetoxifier;
use mollify::detox::standalone::StandaloneDetoxifier;
use mollify::detox::traits::Detoxifier;
use mollify::lang::{self, Language};
use mollify::models::registry::ModelRegistry;
use mollify::tsv;

/// Mollify: multilingual text detoxification.
///
/// Rewrites toxic text into a non-toxic, meaning-preserving form —
/// directly with a rewriting model, or by routing through a pivot
/// language (translate, detoxify, translate back).
#[derive(Parser)]
#[command(name = "mollify", version, about)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StrategyKind {
    /// One model rewrites text directly in its source language
    Standalone,
    /// Translate to the pivot language, detoxify there, translate back
    Backtranslation,
}

#[derive(Subcommand)]
enum Commands {
    /// Detoxify a TSV file of toxic texts
    Run {
        /// File to read
        #[arg(short, long, default_value = "data.tsv")]
        input: PathBuf,

        /// File to write
        #[arg(short, long, default_value = "result.tsv")]
        output: PathBuf,

        /// Column holding the toxic texts
        #[arg(long, default_value = tsv::DEFAULT_TOXIC_COLUMN)]
        column: String,

        /// Language of the input texts
        #[arg(long, default_value = "tt")]
        lang: String,

        /// Detoxification strategy
        #[arg(long, value_enum, default_value_t = StrategyKind::Standalone)]
        strategy: StrategyKind,

        /// Items per model call (overrides the configured default)
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// Detoxify a single text passed on the command line
    Text {
        /// The text to detoxify
        text: String,

        /// Language of the text
        #[arg(long, default_value = "tt")]
        lang: String,

        /// Detoxification strategy
        #[arg(long, value_enum, default_value_t = StrategyKind::Standalone)]
        strategy: StrategyKind,
    },

    /// Download ONNX artifacts for the configured local models
    DownloadModel,

    /// List supported languages and their translation codes
    Languages,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up structured logging; -v/-q adjust the default filter, RUST_LOG
    // still wins when set.
    let default_filter = if cli.quiet {
        "mollify=error"
    } else {
        match cli.verbose {
            0 => "mollify=info",
            1 => "mollify=debug",
            _ => "mollify=trace",
        }
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();

    match cli.command {
        Commands::Run {
            input,
            output,
            column,
            lang,
            strategy,
            batch_size,
        } => {
            let mut config = PipelineConfig::load()?;
            if let Some(batch_size) = batch_size {
                config.batch_size = batch_size;
            }
            let language: Language = lang.parse()?;

            println!("Reading {}...", input.display());
            let texts = tsv::read_column(&input, &column)?;
            if texts.is_empty() {
                println!("{}", "Input file has no rows; nothing to do.".yellow());
                return Ok(());
            }
            println!("  {} texts to detoxify", texts.len());

            let detoxifier = build_detoxifier(&config, strategy)?;

            info!(items = texts.len(), language = %language, "Starting detoxification run");
            let languages = vec![language; texts.len()];
            let results = detoxifier.detoxify_batch(&texts, &languages).await?;

            tsv::write_results(&output, &column, &texts, &results)?;

            println!("\n{}", "Detoxification complete.".bold());
            println!("  Results written to: {}", output.display());
        }

        Commands::Text {
            text,
            lang,
            strategy,
        } => {
            let config = PipelineConfig::load()?;
            let language: Language = lang.parse()?;

            let detoxifier = build_detoxifier(&config, strategy)?;
            let result = detoxifier.detoxify(&text, language).await?;

            println!("{result}");
        }

        Commands::DownloadModel => {
            let config = PipelineConfig::load()?;

            println!("Downloading ONNX models...");
            println!("  Destination: {}", config.model_dir.display());

            let mut downloaded = 0;
            for identifier in [&config.detoxifier_model, &config.translator_model] {
                if let Some(path) = identifier.strip_prefix("hf/") {
                    mollify::models::download::download_model(&config.model_dir, path).await?;
                    downloaded += 1;
                } else {
                    println!("  {identifier} is hosted; nothing to download");
                }
            }

            if downloaded > 0 {
                println!("\n{}", "Models downloaded successfully.".bold());
                println!("You can now run `mollify run` or `mollify text \"...\"`.");
            }
        }

        Commands::Languages => {
            println!("Supported languages:");
            for language in lang::SUPPORTED {
                println!(
                    "  {}  {}  ({})",
                    language.code().bold(),
                    language.translation_code(),
                    language.name()
                );
            }
        }
    }

    Ok(())
}

/// Assemble the requested strategy. Backtranslation always nests a
/// standalone detoxifier for the pivot-language stage.
fn build_detoxifier(
    config: &PipelineConfig,
    strategy: StrategyKind,
) -> Result<Box<dyn Detoxifier>> {
    let registry = ModelRegistry::builtin();
    match strategy {
        StrategyKind::Standalone => Ok(Box::new(StandaloneDetoxifier::new(config, &registry)?)),
        StrategyKind::Backtranslation => {
            let inner = StandaloneDetoxifier::new(config, &registry)?;
            Ok(Box::new(BacktranslationDetoxifier::new(
                config,
                &registry,
                Box::new(inner),
            )?))
        }
    }
}
