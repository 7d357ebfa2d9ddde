//! bufferorch entry point.
//!
//! Brings up the configured ports, applies a buffer plan and prints the
//! resulting pool and profile state as JSON.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use sonic_bufferorch::audit::{init_logging, init_logging_pretty};
use sonic_bufferorch::{BufferOrch, BufferOrchConfig, BufferPlan, PlanError};
use tracing::{error, info};

const DEFAULT_CONFIG_PATH: &str = "/etc/sonic/bufferorch.toml";

/// SONiC shared buffer orchestration
#[derive(Parser, Debug)]
#[command(name = "bufferorch")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Hardware profile and logging configuration
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Buffer plan to apply (BUFFER_POOL, BUFFER_PROFILE, BUFFER_PG, ...)
    #[arg(short = 'p', long)]
    plan: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config
    #[arg(short = 'l', long)]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let config = match load_config(args.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("bufferorch: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let level = args.log_level.as_deref().unwrap_or(&config.logging.level);
    if args.json || config.logging.json {
        init_logging(level);
    } else {
        init_logging_pretty(level);
    }

    match run(&args, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(status) = e.downcast_ref::<PlanError>().and_then(PlanError::status) {
                error!(status = %status, error = %e, "Buffer plan rejected");
            } else {
                error!(error = %format!("{:#}", e), "bufferorch failed");
            }
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<BufferOrchConfig> {
    match path {
        Some(path) => BufferOrchConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display())),
        None if std::path::Path::new(DEFAULT_CONFIG_PATH).exists() => {
            BufferOrchConfig::from_file(DEFAULT_CONFIG_PATH)
                .with_context(|| format!("loading {}", DEFAULT_CONFIG_PATH))
        }
        None => Ok(BufferOrchConfig::default()),
    }
}

fn run(args: &Args, config: &BufferOrchConfig) -> Result<()> {
    let hw = &config.hardware;
    info!(
        total_buffer_bytes = hw.total_buffer_bytes,
        tile_count = hw.tile_count,
        ports = hw.port_count,
        "Starting bufferorch"
    );

    let mut orch = BufferOrch::from_config(config);
    for hw_port_number in 0..hw.port_count {
        orch.register_port(hw_port_number, hw.pgs_per_port, hw.queues_per_port)
            .with_context(|| format!("registering port {}", hw_port_number))?;
    }

    let plan = match &args.plan {
        Some(path) => BufferPlan::from_file(path)?,
        None => BufferPlan::default(),
    };
    let applied = plan.apply(&mut orch)?;

    let report = applied.report(&orch)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
