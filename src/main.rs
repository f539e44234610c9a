//! midi-snapshot - MIDI hot-plug listener for preset and snapshot navigation

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use midi_snapshot::config::{AppConfig, DriverKind};
use midi_snapshot::drivers::{ConsoleDriver, ModUiDriver, PresetNavigator, SnapshotInventory};
use midi_snapshot::paths::AppPaths;
use midi_snapshot::{DeviceBackend, MappingTable, MidirBackend, Plugin};

/// MIDI client name shown by the system MIDI API
const CLIENT_NAME: &str = "midi-snapshot";

/// Map MIDI controller messages to preset and snapshot navigation
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (default: midi_snapshot_plugin.yml in the data directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Format of the stderr log output
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Directory for the rotating log file (default: logs in the data directory)
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// List available MIDI input ports
    #[arg(long)]
    list_ports: bool,

    /// Load the configuration, print the resolved bindings and exit
    #[arg(long)]
    check_config: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    /// One JSON object per line
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let mut paths = AppPaths::detect();
    if let Some(config) = &args.config {
        paths.config = config.clone();
    }
    if let Some(log_dir) = &args.log_dir {
        paths.logs_dir = log_dir.clone();
    }
    paths.ensure_directories()?;

    // Held until exit so buffered log lines are flushed
    let _log_guard = init_logging(&args.log_level, args.log_format, &paths)?;

    info!("Starting midi-snapshot v{}...", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", paths.config.display());

    let backend: Arc<dyn DeviceBackend> = Arc::new(MidirBackend::new(CLIENT_NAME));

    if args.list_ports {
        list_ports_formatted(backend.as_ref());
        return Ok(());
    }

    let config = AppConfig::load(&paths.config).await?;

    if args.check_config {
        print_config_summary(&config, &paths.config);
        return Ok(());
    }

    for warning in config.warnings() {
        warn!("Configuration: {}", warning);
    }

    let (navigator, inventory) = build_driver(&config)?;

    let plugin = Plugin::register(&config, navigator, inventory, backend)
        .context("Failed to start device monitoring")?;

    shutdown_signal().await;
    plugin.stop().await;

    info!("midi-snapshot shutdown complete");
    Ok(())
}

/// Build the collaborators selected by `driver.kind`
fn build_driver(
    config: &AppConfig,
) -> Result<(Arc<dyn PresetNavigator>, Arc<dyn SnapshotInventory>)> {
    match config.driver.kind {
        DriverKind::Console => {
            let driver = Arc::new(ConsoleDriver::new("console", config.driver.snapshots.clone()));
            info!(
                "Using console driver ({} snapshot(s))",
                config.driver.snapshots.len()
            );
            let navigator: Arc<dyn PresetNavigator> = driver.clone();
            let inventory: Arc<dyn SnapshotInventory> = driver;
            Ok((navigator, inventory))
        }
        DriverKind::Modui => {
            let driver = Arc::new(
                ModUiDriver::new(&config.driver.url, config.driver.timeout())
                    .context("Failed to create MOD-UI client")?,
            );
            info!("Using MOD-UI driver at {}", config.driver.url);
            let navigator: Arc<dyn PresetNavigator> = driver.clone();
            let inventory: Arc<dyn SnapshotInventory> = driver;
            Ok((navigator, inventory))
        }
    }
}

/// Stderr output plus a daily rolling log file
fn init_logging(level: &str, format: LogFormat, paths: &AppPaths) -> Result<WorkerGuard> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let (file_writer, guard) = tracing_appender::non_blocking(paths.log_appender()?);

    let text_layer = (format == LogFormat::Text).then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
    });
    let json_layer = (format == LogFormat::Json).then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(text_layer)
        .with(json_layer)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(guard)
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C signal handler");
    info!("Shutdown signal received");
}

fn list_ports_formatted(backend: &dyn DeviceBackend) {
    use colored::*;

    println!("\n{}", "=== Available MIDI Input Ports ===".bold().cyan());

    match backend.list_available_device_ids() {
        Ok(ports) if ports.is_empty() => {
            println!("  {}", "No input ports found".dimmed());
        }
        Ok(ports) => {
            for port in ports {
                println!("  {} {}", "[INPUT]".green(), port);
            }
        }
        Err(e) => {
            println!("  {} {}", "Enumeration failed:".red(), e);
        }
    }

    println!();
}

fn print_config_summary(config: &AppConfig, path: &Path) {
    use colored::*;

    println!("\n{}", "=== Configuration ===".bold().cyan());
    println!("  File: {}", path.display().to_string().bright_white());
    println!("  Driver: {:?}", config.driver.kind);
    if config.driver.kind == DriverKind::Modui {
        println!("  URL: {}", config.driver.url.bright_white());
    }
    println!("  Poll interval: {}s", config.monitor.interval_secs);
    println!("  Verbose: {}", config.verbose);
    for warning in config.warnings() {
        println!("  {} {}", "Warning:".yellow(), warning);
    }

    let table = MappingTable::from_config(&config.midi.snapshot);
    println!("\n{}", "Bindings:".bold());
    if table.is_empty() {
        println!("  {}", "No bindings configured".dimmed());
    }
    for (key, action) in table.entries() {
        let parsed = match action.parse::<midi_snapshot::Action>() {
            Ok(parsed) => parsed.to_string().green(),
            Err(e) => format!("invalid ({})", e).red(),
        };
        println!(
            "  {} ch {:>2} #{:<3} {} {}",
            key.class.to_string().yellow(),
            key.channel,
            key.parameter,
            action.bright_white(),
            parsed
        );
    }

    println!();
}
