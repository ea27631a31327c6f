//! flightvisor: runs the flight pipeline against a scripted vehicle link.
//!
//! The vehicle protocol is not part of this crate, so the binary plays a short
//! scripted flight (heartbeats and telemetry climbing towards the target,
//! then silence). The run ends when the heartbeat receiver declares the
//! vehicle lost, when `run_duration_ms` elapses or on SIGINT/SIGTERM.
//!
//! Exit status is `0` on success and `-1` on any failure.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use flightvisor::Config;
use flightvisor::app;
use flightvisor::link::{Attitude, LinkRef, LocalPositionNed, Message, ScriptedLink};

/// Drone worker pipeline with deadlock-free shutdown.
#[derive(Parser, Debug)]
#[command(name = "flightvisor", version, about)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => {
            println!("Success!");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{e:#}");
            println!("Failed with return code -1");
            ExitCode::from(255)
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let cfg = Config::load(&cli.config)
        .inspect_err(|_| println!("ERROR: Failed to load configuration file"))
        .with_context(|| format!("loading {}", cli.config.display()))?;

    init_tracing()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;

    runtime.block_on(async {
        let report = app::run(&cfg, scripted_flight()).await?;
        tracing::info!(
            drained = ?report.drained,
            stopped = report.joined.stopped,
            "shutdown complete"
        );
        Ok::<_, anyhow::Error>(())
    })
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow!("ERROR: Failed to initialise logger: {e}"))
}

/// Ten seconds of flight climbing towards 4.5 m, then nothing.
fn scripted_flight() -> LinkRef {
    let link = ScriptedLink::new();
    for i in 0..10u32 {
        let ts = i * 1000;
        link.push(Message::Heartbeat)
            .push(Message::LocalPositionNed(LocalPositionNed {
                time_boot_ms: ts,
                z: i as f32 * 0.5,
                vz: 0.5,
                ..Default::default()
            }))
            .push(Message::Attitude(Attitude {
                time_boot_ms: ts + 50,
                ..Default::default()
            }));
    }
    Arc::new(link)
}
