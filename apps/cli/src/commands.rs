//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use reelsmith_core::{ProgressReporter, RunConfig, RunResult, run_session, run_stages};
use reelsmith_core::session::{apply_failures, load_failures};
use reelsmith_shared::{AppConfig, init_config, load_config, load_config_from};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// reelsmith: curate candidate videos into compilation manifests.
#[derive(Parser)]
#[command(
    name = "reelsmith",
    version,
    about = "Filter, deduplicate, categorize and group candidate videos into compilation manifests.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.reelsmith/reelsmith.toml).
    #[arg(long, global = true, env = "REELSMITH_CONFIG")]
    pub config: Option<PathBuf>,

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

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the full pipeline and write a session directory.
    Run {
        /// JSON array of candidate records.
        #[arg(short, long)]
        input: PathBuf,

        /// Session root (defaults to `[session] output_dir`).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Apply the admission filter and print its report.
    Filter {
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Filter, deduplicate and categorize; print the category distribution.
    Categorize {
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Check downloaded media and drop unusable members from a session.
    Validate {
        /// Session directory.
        #[arg(long)]
        session: PathBuf,

        /// Downloads index written by the fetcher.
        #[arg(long)]
        downloads: PathBuf,
    },

    /// Apply collaborator failures to a session's manifests.
    Reconcile {
        /// Session directory.
        #[arg(long)]
        session: PathBuf,

        /// JSON array of failures.
        #[arg(long)]
        failures: PathBuf,
    },

    /// Configuration management.
    Config {
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
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "reelsmith=info",
        1 => "reelsmith=debug",
        _ => "reelsmith=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Run { input, out } => cmd_run(config_path, input, out).await,
        Command::Filter { input } => cmd_filter(config_path, &input).await,
        Command::Categorize { input } => cmd_categorize(config_path, &input).await,
        Command::Validate { session, downloads } => cmd_validate(&session, &downloads).await,
        Command::Reconcile { session, failures } => cmd_reconcile(&session, &failures).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(config_path).await,
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    config.validate()?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(config_path: Option<&Path>, input: PathBuf, out: Option<PathBuf>) -> Result<()> {
    let app = resolve_config(config_path)?;
    let output_root = out.unwrap_or_else(|| PathBuf::from(&app.session.output_dir));

    info!(input = %input.display(), out = %output_root.display(), "starting run");

    let run_config = RunConfig {
        input,
        output_root,
        app,
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
    };

    let reporter = CliProgress::new();
    let result = run_session(&run_config, &reporter)?;

    println!();
    println!("  Session written.");
    println!("  ID:         {}", result.session_id);
    println!("  Admitted:   {}", result.admitted);
    println!("  Rejected:   {}", result.rejected);
    println!("  Malformed:  {}", result.malformed);
    println!("  Duplicates: {}", result.duplicates);
    println!("  Groups:     {}", result.groups);
    println!("  Path:       {}", result.session_path.display());
    println!("  Time:       {:.1}s", result.elapsed.as_secs_f64());
    println!();

    Ok(())
}

async fn cmd_filter(config_path: Option<&Path>, input: &Path) -> Result<()> {
    let app = resolve_config(config_path)?;
    let (records, malformed) = reelsmith_filter::load_records(input)?;
    let (_, report) = reelsmith_filter::filter(records, &app.filter);
    let report = report.with_malformed(malformed);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn cmd_categorize(config_path: Option<&Path>, input: &Path) -> Result<()> {
    let app = resolve_config(config_path)?;
    let (records, malformed) = reelsmith_filter::load_records(input)?;
    let output = run_stages(records, malformed, &app)?;

    println!();
    println!(
        "  {} records after dedup ({} exact, {} fuzzy duplicates removed)",
        output.dedup.retained,
        output.dedup.exact_duplicates,
        output.dedup.fuzzy_duplicates.len()
    );
    for (name, stats) in &output.content.categories {
        println!(
            "  {name:<24} {:>5}  {:>5.1}%  {:>7.1} min",
            stats.count, stats.percentage, stats.total_duration_minutes
        );
    }
    println!();
    Ok(())
}

async fn cmd_validate(session: &Path, downloads: &Path) -> Result<()> {
    let (validation, report) = reelsmith_core::validate_session(session, downloads).await?;

    println!();
    println!("  Valid media:   {}", validation.valid.len());
    println!("  Invalid media: {}", validation.invalid.len());
    for invalid in &validation.invalid {
        println!("    {}: {}", invalid.entry.id, invalid.error);
    }
    println!("  Manifests changed: {}", report.manifests.len());
    println!();
    Ok(())
}

async fn cmd_reconcile(session: &Path, failures: &Path) -> Result<()> {
    if !session.is_dir() {
        return Err(eyre!("session '{}' is not a directory", session.display()));
    }
    let failures = load_failures(failures)?;
    let report = apply_failures(session, &failures)?;

    println!();
    println!("  Failures applied: {}", report.failures_applied);
    for entry in &report.manifests {
        let state = if entry.failed || entry.emptied {
            "failed"
        } else {
            "reduced"
        };
        println!(
            "    {} ({state}): -{} members, {}s remaining",
            entry.name,
            entry.removed_ids.len(),
            entry.total_duration_seconds
        );
    }
    if !report.unmatched.is_empty() {
        println!("  Unmatched failures: {}", report.unmatched.len());
    }
    println!();
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
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
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn done(&self, _result: &RunResult) {
        self.spinner.finish_and_clear();
    }
}
