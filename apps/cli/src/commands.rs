//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use articleforge_client::{HttpGenerationClient, RetryPolicy};
use articleforge_core::{
    CancelHandle, DocumentExporter, JsonExporter, MarkdownExporter, PipelineConfig,
    PipelineResult, ProgressReporter, SubKeywordExpander,
};
use articleforge_shared::api::{BatchSummary, KeywordsResponse};
use articleforge_shared::{
    AppConfig, BatchConfig, BatchProgress, BatchStatus, ContentLength, ContentStyle, JobStatus,
    KeywordId, TargetAudience, config_file_path, init_config, load_api_key, load_config,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// ArticleForge — turn one keyword into a batch of articles.
#[derive(Parser)]
#[command(
    name = "articleforge",
    version,
    about = "Expand a seed keyword into sub-keywords and generate one article per keyword.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Exported document format.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum ExportFormat {
    Markdown,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the full pipeline: expand, generate, assemble, export.
    Generate {
        /// Seed keyword to expand.
        seed: String,

        /// Number of sub-keywords (and articles) to generate.
        #[arg(short, long)]
        count: Option<u32>,

        /// Writing tone: informative, friendly, or professional.
        #[arg(long)]
        style: Option<ContentStyle>,

        /// Article length: short, medium, or long.
        #[arg(long)]
        length: Option<ContentLength>,

        /// Audience: general, beginner, or expert.
        #[arg(long)]
        audience: Option<TargetAudience>,

        /// Maximum concurrent generation jobs.
        #[arg(long)]
        concurrency: Option<u32>,

        /// Output file path (defaults to <seed-slug>.<ext> in the cwd).
        #[arg(short, long)]
        out: Option<String>,

        /// Export format.
        #[arg(short, long, default_value = "markdown")]
        format: ExportFormat,
    },

    /// Expand a seed keyword and print the editable keyword list as JSON.
    Keywords {
        /// Seed keyword to expand.
        seed: String,

        /// Number of sub-keywords to derive.
        #[arg(short, long)]
        count: Option<u32>,

        /// Audience: general, beginner, or expert.
        #[arg(long)]
        audience: Option<TargetAudience>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
    /// Print the config file path.
    Path,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "articleforge=info",
        1 => "articleforge=debug",
        _ => "articleforge=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command. With `--log-format json` the closing batch
/// summary is emitted as a machine-readable envelope instead of the
/// human-readable block.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let json_output = matches!(cli.log_format, LogFormat::Json);
    match cli.command {
        Command::Generate {
            seed,
            count,
            style,
            length,
            audience,
            concurrency,
            out,
            format,
        } => {
            cmd_generate(
                &seed,
                count,
                style,
                length,
                audience,
                concurrency,
                out.as_deref(),
                format,
                json_output,
            )
            .await
        }
        Command::Keywords {
            seed,
            count,
            audience,
        } => cmd_keywords(&seed, count, audience).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
            ConfigAction::Path => cmd_config_path(),
        },
    }
}

/// Merge CLI flag overrides into the batch config from file defaults.
fn merged_batch_config(
    config: &AppConfig,
    count: Option<u32>,
    style: Option<ContentStyle>,
    length: Option<ContentLength>,
    audience: Option<TargetAudience>,
    concurrency: Option<u32>,
) -> BatchConfig {
    let mut batch = BatchConfig::from(config);
    if let Some(count) = count {
        batch.keyword_count = count;
    }
    if let Some(style) = style {
        batch.options.content_style = style;
    }
    if let Some(length) = length {
        batch.options.content_length = length;
    }
    if let Some(audience) = audience {
        batch.options.target_audience = audience;
    }
    if let Some(concurrency) = concurrency {
        batch.concurrency = concurrency;
    }
    batch
}

#[allow(clippy::too_many_arguments)]
async fn cmd_generate(
    seed: &str,
    count: Option<u32>,
    style: Option<ContentStyle>,
    length: Option<ContentLength>,
    audience: Option<TargetAudience>,
    concurrency: Option<u32>,
    out: Option<&str>,
    format: ExportFormat,
    json_output: bool,
) -> Result<()> {
    let config = load_config()?;
    let api_key = load_api_key(&config)?;

    let batch = merged_batch_config(&config, count, style, length, audience, concurrency);
    let pipeline_config = PipelineConfig {
        seed: seed.to_string(),
        batch,
        retry: config.retry.clone(),
    };

    let backend = Arc::new(HttpGenerationClient::new(&config.generator, api_key)?);

    info!(
        seed,
        count = pipeline_config.batch.keyword_count,
        concurrency = pipeline_config.batch.concurrency,
        "starting article generation"
    );

    // Ctrl-C stops dispatching new jobs; in-flight calls finish naturally.
    let cancel = CancelHandle::new();
    let cancel_on_sigint = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\ncancelling: waiting for in-flight generations to finish...");
            cancel_on_sigint.cancel();
        }
    });

    let reporter = CliProgress::new();
    let result =
        articleforge_core::pipeline::run(&pipeline_config, backend, &cancel, &reporter).await?;
    reporter.finish();

    let exporter: Box<dyn DocumentExporter> = match format {
        ExportFormat::Markdown => Box::new(MarkdownExporter),
        ExportFormat::Json => Box::new(JsonExporter),
    };
    let out_path = resolve_out_path(out, &config, seed, exporter.extension());
    if let Some(parent) = out_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| eyre!("failed to create {}: {e}", parent.display()))?;
        }
    }
    let bytes = exporter.export(&result.document)?;
    std::fs::write(&out_path, bytes)
        .map_err(|e| eyre!("failed to write {}: {e}", out_path.display()))?;

    if json_output {
        let summary = BatchSummary::from_outcome(&result.outcome);
        println!("{}", serde_json::to_string(&summary)?);
    } else {
        print_summary(&result, &out_path);
    }
    Ok(())
}

async fn cmd_keywords(
    seed: &str,
    count: Option<u32>,
    audience: Option<TargetAudience>,
) -> Result<()> {
    let config = load_config()?;
    let api_key = load_api_key(&config)?;

    let batch = merged_batch_config(&config, count, None, None, audience, None);
    let backend = Arc::new(HttpGenerationClient::new(&config.generator, api_key)?);
    let retry = RetryPolicy::from_config(&config.retry);

    let expander = SubKeywordExpander::new(backend, retry);
    let keywords = expander
        .expand(seed, batch.keyword_count, &batch.options)
        .await?;

    let response = KeywordsResponse::ok(keywords);
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("created {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config = load_config()?;
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

fn cmd_config_path() -> Result<()> {
    println!("{}", config_file_path()?.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// Output helpers
// ---------------------------------------------------------------------------

/// Pick the output path: explicit flag wins, otherwise
/// `<output_dir>/<seed-slug>.<ext>` from the config defaults.
fn resolve_out_path(out: Option<&str>, config: &AppConfig, seed: &str, extension: &str) -> PathBuf {
    match out {
        Some(p) => PathBuf::from(p),
        None => expand_home(&config.defaults.output_dir)
            .join(format!("{}.{extension}", slug_stem(seed))),
    }
}

/// Expand a leading `~` to the user's home directory.
fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// File stem for the default output name. Seeds that slugify to nothing
/// (punctuation only) fall back to a fixed stem so the path never
/// degenerates to a bare `.<ext>` dotfile.
fn slug_stem(seed: &str) -> String {
    let slug = slugify(seed);
    if slug.is_empty() { "articles".to_string() } else { slug }
}

/// Lowercase, alphanumerics kept, everything else collapsed to '-'.
fn slugify(text: &str) -> String {
    let mut slug = String::new();
    let mut last_dash = true;
    for c in text.to_lowercase().chars() {
        if c.is_alphanumeric() {
            slug.push(c);
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    slug.trim_end_matches('-').to_string()
}

fn print_summary(result: &PipelineResult, out_path: &std::path::Path) {
    println!();
    match result.outcome.status {
        BatchStatus::Succeeded => println!("  Batch completed successfully!"),
        BatchStatus::PartiallyFailed => println!("  Batch completed with failures."),
    }
    println!("  Batch:    {}", result.batch_id);
    println!("  Keywords: {}", result.keywords.len());
    println!("  Articles: {}", result.outcome.articles.len());

    if !result.outcome.failures.is_empty() {
        println!("  Failed:");
        for failure in &result.outcome.failures {
            println!(
                "    #{} {} ({} attempts)",
                failure.id, failure.kind, failure.attempts
            );
        }
    }

    println!("  Output:   {}", out_path.display());
    println!("  Time:     {:.1}s", result.elapsed.as_secs_f64());
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn on_transition(&self, job: KeywordId, _previous: JobStatus, next: JobStatus) {
        if next == JobStatus::Retrying {
            self.spinner
                .set_message(format!("Job #{job} hit a transient error, retrying"));
        }
    }

    fn on_batch_snapshot(&self, progress: &BatchProgress) {
        self.spinner.set_message(format!(
            "Generating [{}/{}] ({} running, {} failed)",
            progress.completed() + progress.failed(),
            progress.total,
            progress.in_flight(),
            progress.failed(),
        ));
    }
}
