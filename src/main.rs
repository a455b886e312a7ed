mod catalog;
mod collector;
mod config;
mod inventory;
mod models;
mod runlog;
mod session;
mod sink;
mod utils;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use catalog::Catalog;
use collector::{Collector, RunReport};
use config::{Config, ConfigError};
use inventory::Inventory;
use runlog::{RunKind, RunLog};
use session::{Driver, ReplayDriver, SshDriver};
use sink::{FileTreeSink, ResultSink, TabularSink};

const EXIT_OK: u8 = 0;
const EXIT_FAILURES: u8 = 1;
const EXIT_CONFIG: u8 = 2;
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser)]
#[command(name = "netsurvey")]
#[command(about = "Collect facts and configuration from network devices", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,

    /// Inventory directory holding hosts.yaml, groups.yaml and defaults.yaml (overrides INVENTORY_DIR)
    #[arg(long, global = true)]
    inventory: Option<PathBuf>,

    /// Output root (overrides OUTPUT_DIR)
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Devices contacted concurrently within a platform group (overrides NUM_WORKERS)
    #[arg(short, long, global = true)]
    workers: Option<usize>,

    /// Serve results from a previous discovery tree instead of connecting to devices
    #[arg(long, global = true)]
    replay: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Mode {
    /// Save every getter as JSON and every config slice as text, one file per device
    Discovery,
    /// Build a Diagnostics workbook from facts, interfaces, addressing, LLDP and users
    Collection {
        /// Customer name used in the workbook file name (overrides CUSTOMER_NAME)
        #[arg(short, long)]
        customer: Option<String>,
    },
}

impl Mode {
    fn kind(&self) -> RunKind {
        match self {
            Mode::Discovery => RunKind::Discovery,
            Mode::Collection { .. } => RunKind::Collection,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "netsurvey=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(report) => ExitCode::from(exit_code(&report)),
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::from(EXIT_CONFIG)
        }
    }
}

/// Everything before the first device is contacted is fatal and surfaces
/// as an error; after that the run always produces a report.
async fn run(cli: Cli) -> anyhow::Result<RunReport> {
    let cfg = load_config(&cli)?;
    let kind = cli.mode.kind();

    tracing::info!("Starting netsurvey {}", kind.label().to_lowercase());
    tracing::info!("Inventory: {}", cfg.inventory_dir.display());
    tracing::info!("Output: {}", cfg.output_dir.display());

    if cfg.credentials.is_none() {
        tracing::warn!("NET_USERNAME/NET_PASSWORD not set - devices without inventory credentials get empty ones");
    }

    let inventory = Inventory::load(&cfg.inventory_dir, cfg.credentials.as_ref())?;
    if inventory.is_empty() {
        tracing::warn!("Inventory has no devices");
    }

    config::ensure_writable(&cfg.logs_dir())?;
    match kind {
        RunKind::Discovery => {
            config::ensure_writable(&cfg.facts_dir())?;
            config::ensure_writable(&cfg.configs_dir())?;
        }
        RunKind::Collection => config::ensure_writable(&cfg.output_dir)?,
    }

    let started = chrono::Local::now();
    let log = Arc::new(RunLog::create(&cfg.logs_dir(), kind, started)?);
    tracing::info!("Run log: {}", log.path().display());
    if cfg.credentials.is_none() {
        log.line("WARNING : no default credentials configured");
    }

    let sink: Arc<dyn ResultSink> = match kind {
        RunKind::Discovery => Arc::new(FileTreeSink::new(&cfg.output_dir)),
        RunKind::Collection => Arc::new(TabularSink::for_customer(&cfg.output_dir, &cfg.customer_name, started)),
    };
    let driver: Arc<dyn Driver> = match &cli.replay {
        Some(dir) => Arc::new(ReplayDriver::new(dir)),
        None => Arc::new(SshDriver::new(cfg.ssh_timeout_secs)),
    };

    let collector = Collector::new(Catalog::builtin(), driver, sink, log).with_workers(cfg.num_workers);
    let report = collector.run_until(&inventory, shutdown_signal()).await;

    if !report.skipped.is_empty() {
        tracing::warn!("Skipped {} devices with unknown platforms: {}", report.skipped.len(), report.skipped.join(", "));
    }
    if let Some(path) = &report.artifact {
        tracing::info!("Report: {}", path.display());
    }
    tracing::info!(
        "Finished: {} outcomes, {} succeeded, {} failed, {} not implemented, {} total",
        report.outcomes.len(),
        report.summary.success_count,
        report.summary.fail_count,
        report.summary.not_implemented_count,
        report.summary.total_count()
    );
    Ok(report)
}

fn load_config(cli: &Cli) -> Result<Config, ConfigError> {
    let mut cfg = Config::load()?;
    if let Some(dir) = &cli.inventory {
        cfg.inventory_dir = dir.clone();
    }
    if let Some(dir) = &cli.output {
        cfg.output_dir = dir.clone();
    }
    if let Some(workers) = cli.workers {
        if workers == 0 {
            return Err(ConfigError::InvalidSetting {
                key: "--workers",
                value: workers.to_string(),
            });
        }
        cfg.num_workers = workers;
    }
    if let Mode::Collection { customer: Some(name) } = &cli.mode {
        cfg.customer_name = name.clone();
    }
    Ok(cfg)
}

fn exit_code(report: &RunReport) -> u8 {
    if report.interrupted {
        EXIT_INTERRUPTED
    } else if report.has_failures() {
        EXIT_FAILURES
    } else {
        EXIT_OK
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => { sig.recv().await; }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_modes_and_overrides() {
        let cli = Cli::try_parse_from([
            "netsurvey",
            "collection",
            "--customer",
            "Acme",
            "--workers",
            "4",
            "--replay",
            "/tmp/prev",
        ])
        .unwrap();
        assert!(matches!(&cli.mode, Mode::Collection { customer: Some(c) } if c == "Acme"));
        assert_eq!(cli.workers, Some(4));
        assert_eq!(cli.replay, Some(PathBuf::from("/tmp/prev")));
        assert_eq!(cli.mode.kind(), RunKind::Collection);

        let cli = Cli::try_parse_from(["netsurvey", "--output", "/srv/out", "discovery"]).unwrap();
        assert_eq!(cli.mode.kind(), RunKind::Discovery);
        assert_eq!(cli.output, Some(PathBuf::from("/srv/out")));
    }

    #[test]
    fn test_cli_requires_mode() {
        assert!(Cli::try_parse_from(["netsurvey"]).is_err());
    }

    #[test]
    fn test_exit_codes() {
        let mut report = RunReport {
            summary: models::RunSummary::default(),
            outcomes: Vec::new(),
            skipped: Vec::new(),
            interrupted: false,
            artifact: None,
            output_error: None,
        };
        assert_eq!(exit_code(&report), EXIT_OK);

        report.summary.not_implemented_count = 3;
        assert_eq!(exit_code(&report), EXIT_OK);

        report.summary.fail_count = 1;
        assert_eq!(exit_code(&report), EXIT_FAILURES);

        report.interrupted = true;
        assert_eq!(exit_code(&report), EXIT_INTERRUPTED);
    }
}
