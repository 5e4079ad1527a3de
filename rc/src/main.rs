//! recocache - top-sites cache invalidation coordinator
//!
//! CLI entry point for simulating the coordinator and inspecting configuration.

use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use clap::Parser;
use colored::*;
use eyre::{Context, Result, eyre};
use serde::Serialize;
use tracing::{debug, info, warn};

use recocache::cli::{Cli, Command, OutputFormat, get_log_path};
use recocache::config::Config;
use recocache::coordinator::{CoordinatorMetrics, InvalidationCoordinator, ObserverDelegate};
use recocache::events::{EventBus, EventKind, spawn_event_logger};
use recocache::registry::CoordinatorRegistry;
use recocache::store::{MemoryStore, RepopulateCall};

/// How long to wait for emitted events to reach the coordinator
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level).map(|s| s.to_uppercase()) {
        Some(s) => match s.as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());

    // Setup logging with priority: CLI > config > INFO default
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Simulate {
            events,
            gap_ms,
            soft,
            shutdown,
            format,
        } => cmd_simulate(&config, &events, Duration::from_millis(gap_ms), soft, shutdown, format).await,
        Command::Config { format } => cmd_config(&config, format),
    }
}

/// Delegate that counts callbacks and optionally echoes them
struct PrintingDelegate {
    echo: bool,
    will: AtomicUsize,
    did: AtomicUsize,
}

impl PrintingDelegate {
    fn new(echo: bool) -> Self {
        Self {
            echo,
            will: AtomicUsize::new(0),
            did: AtomicUsize::new(0),
        }
    }
}

impl ObserverDelegate for PrintingDelegate {
    fn will_invalidate(&self) {
        let n = self.will.fetch_add(1, Ordering::SeqCst) + 1;
        if self.echo {
            println!("{} will invalidate (#{})", "→".yellow(), n);
        }
    }

    fn did_invalidate(&self) {
        let n = self.did.fetch_add(1, Ordering::SeqCst) + 1;
        if self.echo {
            println!("{} did invalidate (#{})", "←".green(), n);
        }
    }
}

#[derive(Debug, Serialize)]
struct EmittedEvent {
    event: String,
    delivered: usize,
}

#[derive(Debug, Serialize)]
struct CallbackCounts {
    will: usize,
    did: usize,
}

#[derive(Debug, Serialize)]
struct SimulationReport {
    coordinator: String,
    #[serde(rename = "cache-size")]
    cache_size: i32,
    emitted: Vec<EmittedEvent>,
    calls: Vec<RepopulateCall>,
    callbacks: CallbackCounts,
    metrics: CoordinatorMetrics,
}

async fn cmd_simulate(
    config: &Config,
    events: &[String],
    gap: Duration,
    soft: u32,
    shutdown: bool,
    format: OutputFormat,
) -> Result<()> {
    debug!(?events, ?gap, soft, shutdown, %format, "cmd_simulate: called");
    let store = Arc::new(MemoryStore::from_config(&config.store));
    let bus = Arc::new(EventBus::new(config.bus.channel_capacity));
    let logger = spawn_event_logger(&bus);
    let registry = CoordinatorRegistry::new(store.clone(), bus.clone(), &config.coordinator)
        .context("Failed to build coordinator registry")?;
    let coordinator = registry.activity_stream();

    let delegate = Arc::new(PrintingDelegate::new(format == OutputFormat::Text));
    coordinator.set_delegate(&delegate);

    let mut emitted = Vec::with_capacity(events.len());
    let mut delivered_total = 0u64;
    for (i, name) in events.iter().enumerate() {
        if i > 0 && !gap.is_zero() {
            tokio::time::sleep(gap).await;
        }
        let Ok(kind) = name.parse::<EventKind>();
        let delivered = bus.emit(kind.clone());
        if delivered == 0 {
            warn!(%kind, "cmd_simulate: event had no subscribers");
        }
        delivered_total += delivered as u64;
        emitted.push(EmittedEvent {
            event: kind.to_string(),
            delivered,
        });
    }

    wait_for_events(coordinator, delivered_total).await?;
    coordinator.settle().await;

    if shutdown {
        store.begin_shutdown();
    }
    for _ in 0..soft {
        let _ = coordinator.invalidate(false);
    }

    coordinator.settle().await;
    registry.teardown();

    let report = SimulationReport {
        coordinator: coordinator.name().to_string(),
        cache_size: store.cache_size(),
        emitted,
        calls: store.calls(),
        callbacks: CallbackCounts {
            will: delegate.will.load(Ordering::SeqCst),
            did: delegate.did.load(Ordering::SeqCst),
        },
        metrics: coordinator.metrics(),
    };

    // Dropping the last bus handle closes the tap and lets the logger finish
    drop(registry);
    drop(bus);
    match tokio::time::timeout(Duration::from_secs(1), logger).await {
        Ok(Ok(logged)) => debug!(logged, "cmd_simulate: event logger finished"),
        _ => warn!("cmd_simulate: event logger did not finish"),
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&report)?),
        OutputFormat::Text => print_report(&report),
    }
    Ok(())
}

async fn wait_for_events(coordinator: &InvalidationCoordinator, expected: u64) -> Result<()> {
    debug!(expected, "wait_for_events: called");
    tokio::time::timeout(DELIVERY_TIMEOUT, async {
        while coordinator.metrics().events_received < expected {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .map_err(|_| eyre!("Timed out waiting for {} events to reach the coordinator", expected))
}

fn print_report(report: &SimulationReport) {
    let m = &report.metrics;
    println!(
        "{} {}: {} repopulates ({} forced, {} soft)",
        "✓".green(),
        report.coordinator.cyan(),
        m.requested,
        m.forced_refreshes,
        m.soft_refreshes
    );
    for event in &report.emitted {
        let delivered = if event.delivered > 0 {
            "delivered".green()
        } else {
            "not subscribed".dimmed()
        };
        println!("  event {} {}", event.event.yellow(), delivered);
    }
    for (i, call) in report.calls.iter().enumerate() {
        println!(
            "  #{} force-refresh={} limit={}",
            i + 1,
            call.force_refresh.to_string().bold(),
            call.limit
        );
    }
    println!("  callbacks: will={} did={}", report.callbacks.will, report.callbacks.did);
    println!(
        "  completed={} failed={} skipped-shutdown={}",
        m.completed, m.failed, m.skipped_shutdown
    );
}

fn cmd_config(config: &Config, format: OutputFormat) -> Result<()> {
    debug!(%format, "cmd_config: called");
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(config)?),
        OutputFormat::Text | OutputFormat::Yaml => print!("{}", serde_yaml::to_string(config)?),
    }
    Ok(())
}
