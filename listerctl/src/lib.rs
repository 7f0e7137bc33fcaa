use std::future::Future;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use lister_core::{
    dedup_directory, load_lister_config, DedupReport, Driver, DriverError, IterationReport,
    LaunchOverrides, ListerConfig, MediaError,
};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] lister_core::ConfigError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("config rendering error: {0}")]
    Toml(#[from] toml::ser::Error),
    #[error(transparent)]
    Driver(#[from] DriverError),
    #[error("media error: {0}")]
    Media(#[from] MediaError),
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Marketplace listing automation daemon", long_about = None)]
pub struct Cli {
    /// Path to lister.toml
    #[arg(long, default_value = "configs/lister.toml")]
    pub config: PathBuf,
    /// Overrides backend.base_url
    #[arg(long)]
    pub backend_url: Option<String>,
    /// Run Chromium without a window regardless of the config
    #[arg(long, default_value_t = false)]
    pub headless: bool,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Polls the backend until interrupted
    Run,
    /// Runs a single scheduler iteration and prints its counters
    Once,
    /// Removes near-duplicate frames from a directory
    Dedup(DedupArgs),
    /// Validates and prints the effective configuration
    Config,
}

#[derive(Args, Debug)]
pub struct DedupArgs {
    /// Directory holding the frames
    pub dir: PathBuf,
    /// Maximum Hamming distance treated as a duplicate (defaults to media.similarity_threshold)
    #[arg(long)]
    pub threshold: Option<u32>,
}

pub fn run(cli: Cli) -> Result<()> {
    let context = AppContext::new(&cli)?;

    match &cli.command {
        Commands::Run => {
            let runtime = runtime()?;
            runtime.block_on(context.run_daemon(shutdown_signal()))?;
        }
        Commands::Once => {
            let runtime = runtime()?;
            let report = runtime.block_on(context.run_once())?;
            render(&report, cli.format)?;
        }
        Commands::Dedup(args) => {
            let summary = context.dedup(args)?;
            render(&summary, cli.format)?;
        }
        Commands::Config => {
            let view = ConfigView(context.config.clone());
            render(&view, cli.format)?;
        }
    }

    Ok(())
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

fn render<T>(value: &T, format: OutputFormat) -> Result<()>
where
    T: Serialize + DisplayFallback,
{
    match format {
        OutputFormat::Text => {
            println!("{}", value.display());
            Ok(())
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{}", json);
            Ok(())
        }
    }
}

trait DisplayFallback {
    fn display(&self) -> String;
}

#[derive(Debug)]
struct AppContext {
    config: ListerConfig,
    overrides: LaunchOverrides,
}

impl AppContext {
    fn new(cli: &Cli) -> Result<Self> {
        let mut config = load_lister_config(&cli.config)?;
        if let Some(url) = &cli.backend_url {
            config.backend.base_url = url.clone();
            config.validate()?;
        }
        let overrides = LaunchOverrides {
            headless: cli.headless.then_some(true),
        };
        Ok(Self { config, overrides })
    }

    async fn run_daemon<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let mut driver = Driver::from_config(&self.config, self.overrides)?;
        driver.run(shutdown).await;
        info!("daemon stopped");
        Ok(())
    }

    async fn run_once(&self) -> Result<IterationReport> {
        let mut driver = Driver::from_config(&self.config, self.overrides)?;
        let result = driver.run_iteration().await;
        driver.sessions_mut().close_session().await;
        Ok(result?)
    }

    fn dedup(&self, args: &DedupArgs) -> Result<DedupSummary> {
        let threshold = args
            .threshold
            .unwrap_or(self.config.media.similarity_threshold);
        let report = dedup_directory(&args.dir, threshold)?;
        Ok(DedupSummary::new(&args.dir, threshold, report))
    }
}

#[derive(Debug, Serialize)]
pub struct DedupSummary {
    pub dir: PathBuf,
    pub threshold: u32,
    pub kept: Vec<String>,
    pub removed: Vec<String>,
}

impl DedupSummary {
    fn new(dir: &Path, threshold: u32, report: DedupReport) -> Self {
        let names = |paths: Vec<PathBuf>| -> Vec<String> {
            paths
                .iter()
                .filter_map(|path| path.file_name())
                .map(|name| name.to_string_lossy().into_owned())
                .collect()
        };
        Self {
            dir: dir.to_path_buf(),
            threshold,
            kept: names(report.kept),
            removed: names(report.removed),
        }
    }
}

impl DisplayFallback for DedupSummary {
    fn display(&self) -> String {
        let mut lines = vec![format!(
            "{}: kept {}, removed {} (threshold {})",
            self.dir.display(),
            self.kept.len(),
            self.removed.len(),
            self.threshold
        )];
        for name in &self.removed {
            lines.push(format!("  - {name}"));
        }
        lines.join("\n")
    }
}

impl DisplayFallback for IterationReport {
    fn display(&self) -> String {
        let rows = [
            ("media completed", self.media_completed),
            ("media aborted", self.media_aborted),
            ("frames uploaded", self.frames_uploaded),
            ("listings published", self.listings_published),
            ("listings unpublished", self.listings_unpublished),
            ("listings at limit", self.listings_limited),
            ("listings skipped", self.listings_skipped),
            ("accounts cleared", self.accounts_cleared),
            ("listings removed", self.listings_removed),
            ("stats updated", self.stats_updated),
            ("account failures", self.account_failures),
        ];
        rows.iter()
            .map(|(label, value)| format!("{label:<22}{value}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Serialize)]
#[serde(transparent)]
struct ConfigView(ListerConfig);

impl DisplayFallback for ConfigView {
    fn display(&self) -> String {
        match toml::to_string_pretty(&self.0) {
            Ok(text) => text,
            Err(err) => format!("config could not be rendered: {err}"),
        }
    }
}
