//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use leadscout_analyzer::FreshnessAnalyzer;
use leadscout_checkpoint::CheckpointStore;
use leadscout_core::{
    JobReport, JobState, LeadFilter, Orchestrator, ProgressReporter, RunOptions, ScanUnit,
};
use leadscout_export::{CsvExporter, Exporter, JsonExporter};
use leadscout_governor::RateGovernor;
use leadscout_shared::{
    AppConfig, CheckDepth, config_dir, init_config, load_config, validate_config,
};
use leadscout_sources::{DirectoryAdapter, DirectoryConfig};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// LeadScout — find businesses with stale or missing web presences.
#[derive(Parser)]
#[command(
    name = "leadscout",
    version,
    about = "Discover business leads whose websites are outdated or missing.",
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

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Scan one industry in one city.
    Scan {
        /// Industry / search term (e.g. "Friseur").
        #[arg(short = 'b', long)]
        industry: String,

        /// City to search in (e.g. "Dortmund").
        #[arg(short = 's', long)]
        city: String,

        #[command(flatten)]
        opts: ScanArgs,
    },

    /// Scan several industries in one city, checkpointed per industry.
    Bulk {
        /// Comma-separated industry list (e.g. "Friseur,Bäckerei,Metzgerei").
        #[arg(short = 'b', long)]
        industries: String,

        /// City to search in.
        #[arg(short = 's', long)]
        city: String,

        /// Stop starting new industries once this many leads exist
        /// (0 = scan all of them).
        #[arg(long, default_value_t = 0)]
        target: usize,

        #[command(flatten)]
        opts: ScanArgs,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Shared flags for scan and bulk runs. Unset flags fall back to the
/// config file, which falls back to built-in defaults.
#[derive(Args)]
pub(crate) struct ScanArgs {
    /// Stop after this many raw records per industry.
    #[arg(long)]
    limit: Option<u32>,

    /// Result pages to fetch per industry.
    #[arg(long)]
    max_pages: Option<u32>,

    /// Sources to query: directory, maps, or all.
    #[arg(long)]
    sources: Option<String>,

    /// Website check depth: fast, normal, or thorough.
    #[arg(long)]
    depth: Option<String>,

    /// Use the low-and-slow stealth pacing profile.
    #[arg(long)]
    stealth: bool,

    /// Abort the job after this many minutes, keeping partial results.
    #[arg(long)]
    max_duration_mins: Option<u64>,

    /// Minimum quality score (0-100) for a lead.
    #[arg(long)]
    min_quality: Option<u8>,

    /// Keep only leads with a phone number.
    #[arg(long)]
    require_phone: bool,

    /// Keep only leads with an email address.
    #[arg(long)]
    require_email: bool,

    /// Also keep businesses whose websites look actively maintained.
    #[arg(long)]
    include_modern: bool,

    /// Output directory for export files.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Export format: json, csv, or both.
    #[arg(long)]
    format: Option<String>,
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
        0 => "leadscout=info",
        1 => "leadscout=debug",
        _ => "leadscout=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Scan {
            industry,
            city,
            opts,
        } => {
            let units = vec![ScanUnit::new(industry, city)];
            cmd_scan(units, 0, opts).await
        }
        Command::Bulk {
            industries,
            city,
            target,
            opts,
        } => {
            let units: Vec<ScanUnit> = industries
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|industry| ScanUnit::new(industry, city.clone()))
                .collect();
            if units.is_empty() {
                return Err(eyre!("no industries given"));
            }
            cmd_scan(units, target, opts).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Scan command
// ---------------------------------------------------------------------------

async fn cmd_scan(units: Vec<ScanUnit>, target_leads: usize, opts: ScanArgs) -> Result<()> {
    let config = load_config()?;
    validate_config(&config)?;

    let depth: CheckDepth = opts
        .depth
        .as_deref()
        .unwrap_or(&config.defaults.check_depth)
        .parse()
        .map_err(|e| eyre!("{e}"))?;

    let mut stealth = config.stealth.clone();
    stealth.enabled |= opts.stealth;

    // Ctrl-C cancels cooperatively; the in-flight unit exports what it has.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, finishing up");
                cancel.cancel();
            }
        });
    }

    let governor = Arc::new(RateGovernor::new(
        config.rate_limits.clone(),
        stealth,
        cancel.clone(),
    ));
    let analyzer = FreshnessAnalyzer::new(Arc::clone(&governor))?;
    let checkpoints = CheckpointStore::open(config_dir()?.join("checkpoints.json"))?;

    let options = RunOptions {
        max_pages: opts.max_pages.unwrap_or(config.defaults.max_pages),
        limit: opts.limit.unwrap_or(config.defaults.limit) as usize,
        depth,
        max_retries: config.rate_limits.max_retries,
        max_duration: opts.max_duration_mins.map(|m| Duration::from_secs(m * 60)),
        target_leads,
    };

    info!(
        units = units.len(),
        ?depth,
        max_pages = options.max_pages,
        "starting scan"
    );

    let progress = Arc::new(CliProgress::new());
    let mut orchestrator = Orchestrator::new(governor, analyzer, checkpoints, cancel, options)
        .with_filter(build_filter(&config, &opts))
        .with_progress(Arc::clone(&progress) as Arc<dyn ProgressReporter>);

    for adapter in build_adapters(&config, &opts)? {
        orchestrator = orchestrator.with_adapter(adapter);
    }
    for exporter in build_exporters(&config, &opts)? {
        orchestrator = orchestrator.with_exporter(exporter);
    }

    let report = orchestrator.run(&units).await?;
    progress.clear();
    print_summary(&report);
    Ok(())
}

fn build_filter(config: &AppConfig, opts: &ScanArgs) -> LeadFilter {
    let mut filters = config.filters.clone();
    if let Some(min) = opts.min_quality {
        filters.min_quality = min;
    }
    filters.require_phone |= opts.require_phone;
    filters.require_email |= opts.require_email;
    if opts.include_modern && !filters.include_statuses.iter().any(|s| s == "modern") {
        filters.include_statuses.push("modern".into());
    }
    LeadFilter::new(filters)
}

fn build_adapters(
    config: &AppConfig,
    opts: &ScanArgs,
) -> Result<Vec<Arc<dyn leadscout_sources::SourceAdapter>>> {
    let sources = opts
        .sources
        .as_deref()
        .unwrap_or(&config.defaults.sources)
        .to_lowercase();

    let directory = || -> Result<Arc<dyn leadscout_sources::SourceAdapter>> {
        Ok(Arc::new(DirectoryAdapter::new(
            DirectoryConfig::german_yellow_pages(),
        )?))
    };

    match sources.as_str() {
        "directory" => Ok(vec![directory()?]),
        "all" => {
            warn!("no maps adapter is configured, scanning the directory source only");
            Ok(vec![directory()?])
        }
        "maps" => Err(eyre!(
            "the maps source needs an API key and is not configured; use --sources directory"
        )),
        other => Err(eyre!(
            "unknown sources value '{other}': expected directory, maps, or all"
        )),
    }
}

fn build_exporters(config: &AppConfig, opts: &ScanArgs) -> Result<Vec<Box<dyn Exporter>>> {
    let output_dir = match &opts.output {
        Some(dir) => dir.clone(),
        None => expand_home(&config.export.output_dir),
    };
    let format = opts
        .format
        .as_deref()
        .unwrap_or(&config.export.format)
        .to_lowercase();

    let mut exporters: Vec<Box<dyn Exporter>> = Vec::new();
    match format.as_str() {
        "json" => exporters.push(Box::new(JsonExporter::new(&output_dir))),
        "csv" => exporters.push(Box::new(CsvExporter::new(&output_dir))),
        "both" => {
            exporters.push(Box::new(JsonExporter::new(&output_dir)));
            exporters.push(Box::new(CsvExporter::new(&output_dir)));
        }
        other => {
            return Err(eyre!(
                "unknown export format '{other}': expected json, csv, or both"
            ));
        }
    }
    Ok(exporters)
}

/// Expand a leading `~` to the user's home directory.
fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

fn print_summary(report: &JobReport) {
    println!();
    match report.state {
        JobState::Done => println!("  Scan complete."),
        JobState::Degraded => println!("  Scan complete with partial data (some fetches failed)."),
        JobState::Aborted => println!("  Scan aborted — run the same command again to resume."),
        _ => {}
    }
    for unit in &report.units {
        if unit.skipped {
            println!("  {:<30} already done, skipped", unit.unit);
            continue;
        }
        println!(
            "  {:<30} {} leads from {} records ({} pages, {})",
            unit.unit, unit.lead_count, unit.raw_count, unit.pages_fetched, unit.state
        );
        for path in &unit.export_paths {
            println!("      -> {}", path.display());
        }
    }
    println!("  Total leads: {}", report.total_leads());
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Progress display using an indicatif spinner.
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
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }

    fn clear(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn unit_started(&self, unit: &str, from_page: u32) {
        if from_page > 1 {
            self.spinner
                .set_message(format!("{unit}: resuming at page {from_page}"));
        } else {
            self.spinner.set_message(format!("{unit}: starting"));
        }
    }

    fn phase(&self, unit: &str, state: JobState) {
        self.spinner.set_message(format!("{unit}: {state}"));
    }

    fn page_fetched(&self, unit: &str, page: u32, records: usize) {
        self.spinner
            .set_message(format!("{unit}: page {page}, {records} records"));
    }

    fn unit_finished(&self, unit: &str, leads: usize, degraded: bool) {
        let note = if degraded { " (partial)" } else { "" };
        self.spinner
            .println(format!("  {unit}: {leads} leads{note}"));
    }
}

// ---------------------------------------------------------------------------
// Config commands
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
