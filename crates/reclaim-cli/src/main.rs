//! reclaim CLI: run the memory monitor against this process, or drive a
//! synthetic workload through the pools and registry.

mod platform;
mod simulate;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use reclaim_core::config::{MonitorConfig, Retention};
use reclaim_exec::MemoryMonitor;

use crate::platform::SysinfoMetrics;
use crate::simulate::SimulationConfig;

#[derive(Parser)]
#[command(name = "reclaim")]
#[command(about = "Handle pooling and threshold-driven memory monitoring", long_about = None)]
struct Cli {
    /// YAML file with monitor settings (replaces env-derived settings)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Collection threshold in bytes (overrides config)
    #[arg(long, global = true)]
    threshold_bytes: Option<u64>,

    /// Sampling interval in milliseconds (overrides config)
    #[arg(long, global = true)]
    interval_ms: Option<u64>,

    /// Chunk size for chunked processing (overrides config)
    #[arg(long, global = true)]
    chunk_size: Option<usize>,

    /// Keep only the newest N samples per label (overrides config)
    #[arg(long, global = true)]
    history_window: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sample this process's memory for a while and report what happened
    Watch {
        /// How long to run the monitor
        #[arg(long, default_value = "30")]
        duration_secs: u64,
    },

    /// Run a synthetic pool/registry/chunking workload and print a JSON report
    Simulate {
        #[arg(long, default_value = "50")]
        rounds: usize,

        /// Maximum rendered list length per round
        #[arg(long, default_value = "40")]
        items: usize,

        /// Every n-th bound task fails (0 disables failures)
        #[arg(long, default_value = "5")]
        fail_every: usize,
    },

    /// Print the effective configuration as YAML
    ShowConfig,
}

#[derive(Debug, Default)]
struct Overrides {
    threshold_bytes: Option<u64>,
    interval_ms: Option<u64>,
    chunk_size: Option<usize>,
    history_window: Option<usize>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let overrides = Overrides {
        threshold_bytes: cli.threshold_bytes,
        interval_ms: cli.interval_ms,
        chunk_size: cli.chunk_size,
        history_window: cli.history_window,
    };

    let config = match load_config(cli.config.as_deref(), &overrides) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Watch { duration_secs } => watch(config, Duration::from_secs(duration_secs)),
        Commands::Simulate {
            rounds,
            items,
            fail_every,
        } => simulate(
            config,
            SimulationConfig {
                rounds,
                items,
                fail_every,
            },
        ),
        Commands::ShowConfig => show_config(&config),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_config(
    path: Option<&Path>,
    overrides: &Overrides,
) -> Result<MonitorConfig, Box<dyn std::error::Error>> {
    let mut cfg = match path {
        Some(path) => {
            let text = fs::read_to_string(path)?;
            serde_yaml::from_str(&text)?
        }
        None => MonitorConfig::from_env(),
    };
    apply_overrides(&mut cfg, overrides);
    cfg.validate()?;
    Ok(cfg)
}

fn apply_overrides(cfg: &mut MonitorConfig, o: &Overrides) {
    if let Some(v) = o.threshold_bytes {
        cfg.threshold_bytes = v;
    }
    if let Some(v) = o.interval_ms {
        cfg.interval_ms = v;
    }
    if let Some(v) = o.chunk_size {
        cfg.chunk_size = v;
    }
    if let Some(v) = o.history_window {
        cfg.retention = Retention::Window(v);
    }
}

fn runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
}

fn watch(config: MonitorConfig, duration: Duration) -> Result<(), Box<dyn std::error::Error>> {
    let metrics = Arc::new(SysinfoMetrics::new());
    let monitor = MemoryMonitor::new(Arc::clone(&metrics), config)?;

    runtime()?.block_on(async {
        monitor.start();
        let op = monitor.begin_operation("watch");
        let deadline = tokio::time::Instant::now() + duration;
        let mut ticker = tokio::time::interval(monitor.config().interval());
        while tokio::time::Instant::now() < deadline {
            ticker.tick().await;
            if let Some(bytes) = monitor.sample_operation(op) {
                tracing::info!(mib = bytes as f64 / 1_048_576.0, "resident memory");
            }
        }
        monitor.end_operation(op);
        monitor.stop();
    });

    let report = serde_json::json!({
        "monitor": monitor.stats(),
        "collection_hints": metrics.hints(),
        "patterns": monitor.summaries(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn simulate(
    config: MonitorConfig,
    sim: SimulationConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let monitor = MemoryMonitor::new(SysinfoMetrics::new(), config)?;
    let report = runtime()?.block_on(simulate::run(&monitor, sim))?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn show_config(config: &MonitorConfig) -> Result<(), Box<dyn std::error::Error>> {
    print!("{}", serde_yaml::to_string(config)?);
    Ok(())
}
