//! CLI command definitions and handlers

use clap::{Args, Subcommand};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};

use crate::core::checkpoint::CheckpointStore;
use crate::core::config::TranslatorConfig;
use crate::core::engine::build_engine;
use crate::core::models::{EngineKind, Language};
use crate::core::pipeline::{BilingualPipeline, InterruptReason, PipelineOptions, RunOutcome};
use crate::processors::open_document;
use crate::processors::segment::SegmentExtractor;

/// Commands for the bilingual book maker
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Translate an ePub or txt book into a bilingual edition
    Translate(TranslateArgs),

    /// Show how far a previous run got
    Status {
        /// Book whose checkpoint to inspect
        #[arg(long = "book-name", visible_alias = "book_name")]
        book_name: PathBuf,
    },
}

/// Options for `translate`
#[derive(Args, Debug, Clone)]
pub struct TranslateArgs {
    /// Your ePub or txt book
    #[arg(long = "book-name", visible_alias = "book_name")]
    pub book_name: PathBuf,

    /// OpenAI API key (defaults to the OPENAI_API_KEY env var)
    #[arg(long = "openai-key", visible_alias = "openai_key")]
    pub openai_key: Option<String>,

    /// Paid account: skip the pause after each request
    #[arg(long = "no-limit", visible_alias = "no_limit")]
    pub no_limit: bool,

    /// Only translate the first few paragraphs so the result can be checked quickly
    #[arg(long)]
    pub test: bool,

    /// Number of paragraphs translated in test mode
    #[arg(long = "test-num", visible_alias = "test_num", default_value_t = 10)]
    pub test_num: usize,

    /// Engine to use: chatgpt or gpt3
    #[arg(short, long)]
    pub model: Option<String>,

    /// Continue a run that was interrupted
    #[arg(long)]
    pub resume: bool,

    /// Target language: zh-cn, zh-tw or jp (unknown codes use zh-tw)
    #[arg(long)]
    pub lang: Option<String>,

    /// OpenAI-compatible API base URL
    #[arg(long = "api-base", visible_alias = "api_base")]
    pub api_base: Option<String>,

    /// Configuration file (toml, json, yaml)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl TranslateArgs {
    /// Layer these flags over the loaded configuration
    pub fn apply(&self, config: &mut TranslatorConfig) -> anyhow::Result<()> {
        config.resolve_api_key(self.openai_key.clone())?;

        if let Some(model) = &self.model {
            config.model = EngineKind::from_name(model)?;
        }

        if let Some(code) = &self.lang {
            config.language = Language::from_code(code);
        }

        if let Some(api_base) = &self.api_base {
            config.api_base = api_base.clone();
        }

        if self.no_limit {
            config.no_limit = true;
        }

        Ok(())
    }

    /// Segment cap when `--test` is set
    pub fn test_limit(&self) -> Option<usize> {
        self.test.then_some(self.test_num)
    }
}

/// Resolves on Ctrl-C; never resolves if the handler cannot be installed
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Ctrl-C received, saving progress");
}

/// Handle translate command
pub async fn handle_translate(args: TranslateArgs) -> anyhow::Result<()> {
    let start_time = Instant::now();

    let mut config = TranslatorConfig::load(args.config.as_deref())?;
    args.apply(&mut config)?;

    info!("Starting bilingual translation");
    info!("Input: {}", args.book_name.display());
    info!("Model: {}", config.model);
    info!("Target language: {}", config.language);
    info!("Resume: {}", args.resume);

    let engine = build_engine(&config)?;
    let document = open_document(&args.book_name)?;
    let options = PipelineOptions::from_config(&config, args.resume, args.test_limit());
    let mut pipeline = BilingualPipeline::new(engine, document, options);

    let outcome = pipeline.run(shutdown_signal()).await?;
    let duration = start_time.elapsed();

    match outcome {
        RunOutcome::Completed(summary) => {
            println!("\n✅ Translation completed!");
            println!("   Output: {}", summary.output.display());
            println!("   Segments: {}", summary.segments);
            println!("   Translated: {}", summary.translated);
            println!("   From checkpoint: {}", summary.reused);
            if summary.degraded > 0 {
                println!("   Kept untranslated after errors: {}", summary.degraded);
            }
            println!("   Tokens: {}", summary.tokens_used);
            println!("   Time: {:?}", duration);
        }
        RunOutcome::Interrupted {
            reason,
            checkpoint,
            saved,
        } => {
            match reason {
                InterruptReason::Cancelled => println!("\n⏸  Translation interrupted."),
                InterruptReason::EngineFailure { index, message } => {
                    println!("\n⚠️  Translation stopped at segment {}: {}", index, message)
                }
            }
            println!("   Saved {} translations to {}", saved, checkpoint.display());
            println!("   You can resume it next time with:");
            println!(
                "   {} translate --book-name {} --resume",
                env!("CARGO_PKG_NAME"),
                args.book_name.display()
            );
        }
    }

    Ok(())
}

/// Handle status command
pub async fn handle_status(book_name: PathBuf) -> anyhow::Result<()> {
    let document = open_document(&book_name)?;
    let total = SegmentExtractor::new().extract(document.units()).count();
    let store = CheckpointStore::for_book(&book_name);

    if !store.exists() {
        println!("📖 {}: {} segments, no checkpoint yet", book_name.display(), total);
        return Ok(());
    }

    let done = store.load()?.len();
    println!(
        "📖 {}: {}/{} segments translated ({})",
        book_name.display(),
        done,
        total,
        store.path().display()
    );
    if done < total {
        println!(
            "   Resume with: {} translate --book-name {} --resume",
            env!("CARGO_PKG_NAME"),
            book_name.display()
        );
    }

    Ok(())
}
