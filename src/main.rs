// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

use crate::app_config::Config;
use crate::database::{DatabaseConnection, Repository};
use crate::pipeline::{PipelineContext, PipelineOrchestrator};

mod app_config;
mod database;
mod errors;
mod extraction;
mod file_utils;
mod fragments;
mod language_utils;
mod matching;
mod pipeline;
mod providers;
mod scoring;
mod structure;
mod validation;

/// CLI wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ingest translation source files: run extraction and store fragments
    Ingest {
        /// Source files to ingest (PDF, scans, anything the extraction tool accepts)
        #[arg(value_name = "INPUT_PATHS", required = true)]
        input_paths: Vec<PathBuf>,
    },

    /// Match, align, validate, and graft all extracted translations
    Process,

    /// Re-graft output documents from stored alignments, honoring manual
    /// overrides and approvals
    Export,

    /// Show document, match, alignment, and job statistics
    Status,

    /// Generate shell completions for textgraft
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// textgraft - graft translated text into structured reference documents
///
/// Matches translated documents (OCR output) against a catalogue of XML
/// reference documents, aligns paragraphs, and rewrites the reference
/// markup with the translated text while preserving inline formatting.
#[derive(Parser, Debug)]
#[command(name = "textgraft")]
#[command(version)]
#[command(about = "Match and graft translated documents into reference markup")]
#[command(long_about = "textgraft matches translated documents against a catalogue of structured \
XML reference documents, aligns their paragraphs, and grafts the translated text back into the \
reference markup.

EXAMPLES:
    textgraft ingest scans/prayers-es.pdf       # Extract one source file
    textgraft ingest scans/*.pdf                # Extract a batch
    textgraft process                           # Match, align, and graft everything extracted
    textgraft export                            # Re-graft after manual review
    textgraft status                            # Lifecycle and confidence statistics
    textgraft completions bash > textgraft.bash # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config. If the config file doesn't exist, a default one
    will be created automatically.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: String,

    /// SQLite database path (defaults to the per-user data directory)
    #[arg(long)]
    database: Option<PathBuf>,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S%.3f");
            let color = Self::color_for_level(record.level());
            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "{}{} [{}] {}\x1B[0m",
                color,
                now,
                record.level(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize once at info; the level is adjusted after config load
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();

    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(*shell, &mut cmd, "textgraft", &mut std::io::stdout());
        return Ok(());
    }

    if let Some(level) = &cli.log_level {
        let level: app_config::LogLevel = level.clone().into();
        log::set_max_level(level.to_level_filter());
    }

    let config = load_or_create_config(&cli.config_path)?;

    if cli.log_level.is_none() {
        log::set_max_level(config.log_level.to_level_filter());
    }

    let repository = match &cli.database {
        Some(path) => Repository::new(DatabaseConnection::new(path)?),
        None => Repository::new_default()?,
    };

    let context = Arc::new(PipelineContext::new(config, repository)?);

    // Jobs left running by a crashed process are demoted before new work
    let recovered = context.registry.recover().await?;
    if recovered > 0 {
        warn!("Recovered {} stale jobs from a previous run", recovered);
    }

    let orchestrator = PipelineOrchestrator::new(Arc::clone(&context));

    match cli.command {
        Commands::Ingest { input_paths } => run_ingest(&orchestrator, input_paths).await,
        Commands::Process => run_process(&context, &orchestrator).await,
        Commands::Export => run_export(&context, &orchestrator).await,
        Commands::Status => run_status(&context).await,
        Commands::Completions { .. } => Ok(()),
    }
}

fn load_or_create_config(config_path: &str) -> Result<Config> {
    let config = if crate::file_utils::FileManager::file_exists(config_path) {
        Config::from_file(config_path)?
    } else {
        warn!(
            "Config file not found at '{}', creating default config.",
            config_path
        );
        let config = Config::default();
        config
            .save(config_path)
            .with_context(|| format!("Failed to write default config to: {}", config_path))?;
        config
    };

    config.validate().context("Configuration validation failed")?;
    Ok(config)
}

fn progress_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}

async fn run_ingest(orchestrator: &PipelineOrchestrator, paths: Vec<PathBuf>) -> Result<()> {
    let spinner = progress_spinner(&format!("Ingesting {} files", paths.len()));
    let summary = orchestrator.ingest(&paths).await?;
    spinner.finish_and_clear();

    println!(
        "Ingested {} documents ({} skipped, {} failed)",
        summary.ingested, summary.skipped, summary.failed
    );
    if summary.failed > 0 {
        println!("Failed documents will be retried on the next ingest run.");
    }
    Ok(())
}

async fn run_process(
    context: &Arc<PipelineContext>,
    orchestrator: &PipelineOrchestrator,
) -> Result<()> {
    let spinner = progress_spinner("Loading reference catalogue");
    let loaded = context.load_catalogue().await?;
    spinner.set_message(format!("Processing against {} references", loaded));

    let summary = orchestrator.process().await?;
    spinner.finish_and_clear();

    println!(
        "Processed translations: {} matched, {} unmatched, {} failed",
        summary.matched, summary.unmatched, summary.failed
    );
    println!("Job id: {}", summary.job_id);
    Ok(())
}

async fn run_export(
    context: &Arc<PipelineContext>,
    orchestrator: &PipelineOrchestrator,
) -> Result<()> {
    let spinner = progress_spinner("Loading reference catalogue");
    context.load_catalogue().await?;
    spinner.set_message("Exporting grafted documents");

    let summary = orchestrator.export().await?;
    spinner.finish_and_clear();

    println!(
        "Exported {} documents ({} skipped)",
        summary.exported, summary.skipped
    );
    Ok(())
}

async fn run_status(context: &Arc<PipelineContext>) -> Result<()> {
    let repository = &context.repository;

    println!("Documents by status:");
    for (status, count) in repository.count_translations_by_status().await? {
        println!("  {:<12} {}", status, count);
    }

    println!("Document matches by tier:");
    for (tier, count) in repository.count_matches_by_tier().await? {
        println!("  {:<12} {}", tier, count);
    }

    println!("Alignments by tier:");
    for (tier, count) in repository.count_alignments_by_tier().await? {
        println!("  {:<12} {}", tier, count);
    }

    let jobs = repository.list_jobs(None).await?;
    if !jobs.is_empty() {
        println!("Jobs:");
        for job in jobs.iter().rev().take(10) {
            println!(
                "  {} {:<8} {:<9} {:>5.1}%  {}",
                &job.id[..8.min(job.id.len())],
                job.job_type,
                job.state,
                job.completion_percentage(),
                job.error.as_deref().unwrap_or("")
            );
        }
    }

    let stats = repository.connection().stats()?;
    println!("Database: {}", stats);

    info!("Status report complete");
    Ok(())
}
