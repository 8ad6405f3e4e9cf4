//! `codecorpus`: walk a project, estimate its token cost, and check it against model limits.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use codecorpus_config::CorpusConfig;
use codecorpus_context::{
    EstimatorOptions, ModelCompatibilityClassifier, ModelLimitTable, TokenEstimator,
};
use codecorpus_ingest::{
    Completion, DirectoryWalker, IngestOutcome, IngestReport, ManualFileIngestor, ProgressSink,
    WalkOptions,
};
use codecorpus_types::{Corpus, TokenCalculationResult, extension_label};

#[derive(Parser)]
#[command(name = "codecorpus", version, about, long_about = None)]
struct Cli {
    /// Project directory to scan.
    root: PathBuf,

    /// Extra file to include regardless of extension (repeatable).
    #[arg(short, long = "file", value_name = "PATH")]
    files: Vec<PathBuf>,

    /// Prompt template text.
    #[arg(long, conflicts_with = "prompt_file")]
    prompt: Option<String>,

    /// Read the prompt template from a file.
    #[arg(long, value_name = "PATH")]
    prompt_file: Option<PathBuf>,

    /// Config file (defaults to ~/.codecorpus/config.toml).
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Only classify against these models (repeatable).
    #[arg(short, long = "model", value_name = "NAME")]
    models: Vec<String>,

    /// Skip the tokenizer and use the character-ratio estimate.
    #[arg(long)]
    heuristic: bool,

    /// Print the report as JSON.
    #[arg(long)]
    json: bool,
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // stdout carries the report; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

#[derive(Serialize)]
struct JsonReport<'a> {
    root: &'a Path,
    complete: bool,
    files: usize,
    bytes: usize,
    scan: &'a IngestReport,
    manual: &'a IngestReport,
    tokens: &'a TokenCalculationResult,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = match &cli.config {
        Some(path) => CorpusConfig::load_from(path),
        None => CorpusConfig::load(),
    }
    .context("failed to load configuration")?;

    let template = match (&cli.prompt, &cli.prompt_file) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read prompt file {}", path.display()))?,
        (None, None) => config
            .prompt_template()
            .context("failed to load prompt template")?,
    };

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted; finishing with a partial result");
            ctrl_c.cancel();
        }
    });

    let progress = ProgressSink::new(|snapshot| {
        tracing::info!(
            found = snapshot.files_found,
            processed = snapshot.files_processed,
            "Scanning"
        );
    })
    .with_interval(Duration::from_millis(config.scan.progress_interval_ms));

    let scan = &config.scan;
    let options = WalkOptions::default()
        .with_allowed_extensions(&scan.allowed_extensions)
        .with_max_file_size_kb(scan.max_file_size_kb)
        .with_excluded_dir_names(&scan.excluded_dir_names)
        .with_parallel_depth_threshold(scan.parallel_depth_threshold);

    let scanned = DirectoryWalker::new(options)
        .with_progress(progress.clone())
        .with_cancellation(cancel.clone())
        .walk(&cli.root)
        .await
        .with_context(|| format!("failed to scan {}", cli.root.display()))?;
    let scan_report = scanned.report.clone();
    let scan_complete = scanned.is_complete();

    let outcome = ManualFileIngestor::new(scan.max_file_size_kb)
        .with_concurrency(scan.manual_concurrency)
        .with_progress(progress)
        .with_cancellation(cancel)
        .ingest_into(&cli.files, &cli.root, scanned.corpus)
        .await;

    let estimator = TokenEstimator::new(EstimatorOptions {
        tokens_per_char: config.tokens.tokens_per_char,
        buffer_percent: config.tokens.buffer_percent,
        use_encoder: !cli.heuristic,
    });

    let mut limits = ModelLimitTable::builtin();
    for (model, limit) in &config.models {
        limits = limits.with_limit(model.clone(), *limit);
    }
    if !cli.models.is_empty() {
        let (selected, unknown) = limits.select(&cli.models);
        for model in unknown {
            tracing::warn!(model = %model, "Unknown model; no context limit to compare against");
        }
        limits = selected;
    }
    let classifier = ModelCompatibilityClassifier::new(config.tokens.approaching_threshold);

    let IngestOutcome {
        corpus,
        report: manual_report,
        completion,
    } = outcome;
    let complete = scan_complete && completion == Completion::Complete;

    // Tokenizing is CPU-bound; keep it off the async workers.
    let (corpus, result) = tokio::task::spawn_blocking(move || {
        let result = estimator.estimate(&corpus, &template);
        (corpus, result)
    })
    .await
    .context("token estimation task failed")?;
    let compatibility = classifier.classify(&result, &limits);
    let result = result.with_model_compatibility(compatibility);

    if cli.json {
        let report = JsonReport {
            root: &cli.root,
            complete,
            files: corpus.len(),
            bytes: corpus.total_bytes(),
            scan: &scan_report,
            manual: &manual_report,
            tokens: &result,
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("failed to serialize report")?
        );
        return Ok(());
    }

    print_text_report(&cli, complete, &corpus, &scan_report, &manual_report, &result);
    Ok(())
}

fn print_text_report(
    cli: &Cli,
    complete: bool,
    corpus: &Corpus,
    scan: &IngestReport,
    manual: &IngestReport,
    result: &TokenCalculationResult,
) {
    let state = if complete { "complete" } else { "cancelled, partial" };
    println!(
        "Scanned {} ({state}): {} files, {} bytes",
        cli.root.display(),
        corpus.len(),
        corpus.total_bytes()
    );

    let skipped: Vec<_> = scan.skipped.iter().chain(&manual.skipped).collect();
    if !skipped.is_empty() {
        println!("\nSkipped ({}):", skipped.len());
        for entry in skipped {
            println!("  {}: {}", entry.path.display(), entry.reason);
        }
    }

    println!("\nTokens ({} mode):", result.mode().as_str());
    for (extension, tokens) in result.tokens_by_extension() {
        let files = corpus.files(extension).len();
        println!(
            "  {:<10} {:>10}  ({files} files)",
            extension_label(extension),
            tokens
        );
    }
    println!("  {:<18} {:>10}", "prompt template", result.prompt_template_tokens());
    println!("  {:<18} {:>10}", "section headers", result.section_header_tokens());
    println!("  {:<18} {:>10}", "files", result.file_tokens());
    println!("  {:<18} {:>10}", "buffer", result.buffer_tokens());
    println!("  {:<18} {:>10}", "total", result.total_tokens());

    if result.model_compatibility().is_empty() {
        return;
    }
    println!("\nModels:");
    for (model, compat) in result.model_compatibility() {
        println!("  {model:<24} {:>10}  {compat}", compat.context_limit);
    }
}
