//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;

use bizscout_core::pipeline::{
    Collaborators, PipelineConfig, PipelineReport, ProgressReporter, run_pipeline,
};
use bizscout_crawler::HttpFetcher;
use bizscout_discovery::GooglePlacesClient;
use bizscout_intel::HunterClient;
use bizscout_shared::{
    AppConfig, config_file_path, init_config, init_config_at, load_config, load_config_from,
    resolve_secrets, to_toml,
};
use bizscout_storage::Storage;
use chrono::Local;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// bizscout: discover businesses and enrich them with contact data.
#[derive(Parser)]
#[command(
    name = "bizscout",
    version,
    about = "Discover businesses, scrape their contact emails, and enrich them with domain intelligence.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.bizscout/bizscout.toml.
    #[arg(long, global = true, env = "BIZSCOUT_CONFIG")]
    pub config: Option<PathBuf>,

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
    /// Run discovery, website scraping, and domain enrichment in sequence.
    Run,

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
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "bizscout=info",
        1 => "bizscout=debug",
        _ => "bizscout=trace",
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
    let config_path = cli.config;
    match cli.command {
        Command::Run => cmd_run(config_path).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(config_path),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

fn resolve_config(path: Option<PathBuf>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => load_config_from(&path)?,
        None => load_config()?,
    };
    Ok(config)
}

async fn cmd_run(config_path: Option<PathBuf>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let secrets = resolve_secrets(&config)?;

    // The only fatal failure once configured: without a store nothing can run.
    let storage = Storage::connect(&secrets.database_uri)
        .await
        .wrap_err("could not open the record store")?;

    let collaborators = Collaborators {
        places: GooglePlacesClient::new(
            &config.discovery.places_base_url,
            secrets.maps_api_key.as_str(),
        )?,
        fetcher: HttpFetcher::new(&config.crawl)?,
        intel: HunterClient::new(&config.enrichment, secrets.enrichment_api_key.as_str())?,
    };
    let pipeline_config = PipelineConfig::from(&config);

    info!(searches = pipeline_config.searches.len(), "configuration loaded");
    println!("Starting bizscout at {}", Local::now().format("%Y-%m-%d %H:%M:%S"));

    let reporter = CliProgress::new();
    let report = run_pipeline(&pipeline_config, &collaborators, &storage, &reporter).await;

    print_summary(&report);
    println!(
        "Finished bizscout at {}",
        report
            .finished_at
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
    );
    Ok(())
}

fn print_summary(report: &PipelineReport) {
    let d = &report.discovery;
    println!();
    println!(
        "  Discovery:  {} new, {} already known, {} of {} searches failed",
        d.inserted, d.duplicates, d.searches_failed, d.searches
    );

    match &report.website {
        Some(w) => println!(
            "  Websites:   {} updated, {} without emails, {} unreachable, {} skipped",
            w.updated, w.no_emails, w.fetch_failed, w.skipped
        ),
        None => println!("  Websites:   aborted (see log)"),
    }

    match &report.domain {
        Some(h) => println!(
            "  Domains:    {} hunted, {} people, {} emails added, {} lookups failed",
            h.hunted, h.people_upserted, h.emails_appended, h.lookup_failed
        ),
        None => println!("  Domains:    aborted (see log)"),
    }

    let elapsed = report.finished_at - report.started_at;
    println!(
        "  Time:       {:.1}s",
        elapsed.num_milliseconds() as f64 / 1000.0
    );
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
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn stage(&self, name: &str) {
        self.spinner.println(format!("==> {name}"));
        self.spinner.set_message(name.to_string());
    }

    fn item(&self, label: &str, current: usize, total: usize) {
        self.spinner.set_message(format!("[{current}/{total}] {label}"));
    }

    fn done(&self, _report: &PipelineReport) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// Config commands
// ---------------------------------------------------------------------------

fn cmd_config_init(config_path: Option<PathBuf>) -> Result<()> {
    let path = match config_path {
        Some(path) => init_config_at(&path)?,
        None => init_config()?,
    };
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<PathBuf>) -> Result<()> {
    let source = match &config_path {
        Some(path) => path.clone(),
        None => config_file_path()?,
    };
    let config = resolve_config(config_path)?;

    println!("# {}", source.display());
    println!("{}", to_toml(&config)?);

    println!("# environment");
    for var in [
        &config.secrets.maps_api_key_env,
        &config.secrets.enrichment_api_key_env,
        &config.secrets.database_uri_env,
    ] {
        let state = match std::env::var(var) {
            Ok(v) if !v.trim().is_empty() => "set",
            _ => "missing",
        };
        println!("# {var}: {state}");
    }
    Ok(())
}
