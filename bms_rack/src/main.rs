//! # Rack Supervisor
//!
//! Runs the supervisor cycle loop against the in-process simulated rack.
//! Hosts with a real register transport embed the library and construct a
//! [`CycleRunner`] over their own [`RegisterTransport`] instead.
//!
//! [`RegisterTransport`]: bms_common::transport::RegisterTransport

use bms_common::consts::DEFAULT_CONFIG_PATH;
use bms_common::rack::state::StartStop;
use bms_rack::config::{load_config, LoadedConfig};
use bms_rack::cycle::CycleRunner;
use bms_rack::sim::SimulatedRack;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Level};
use tracing_subscriber::EnvFilter;

/// Rack supervisor: cyclic battery rack control over a register transport
#[derive(Parser, Debug)]
#[command(name = "bms_rack")]
#[command(version)]
#[command(about = "Cyclic battery rack supervisor (simulated rack)")]
struct Args {
    /// Path to the supervisor configuration TOML.
    #[arg(default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Host start/stop command (only used with `start_stop = "auto"`).
    #[arg(long, value_enum, default_value_t = Target::Start)]
    target: Target,

    /// Stop after N cycles (default: run until Ctrl-C).
    #[arg(long, value_name = "N")]
    cycles: Option<u64>,

    /// Print the final rack status as JSON on stdout.
    #[arg(long)]
    status: bool,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Target {
    Start,
    Stop,
}

impl From<Target> for StartStop {
    fn from(t: Target) -> Self {
        match t {
            Target::Start => StartStop::Start,
            Target::Stop => StartStop::Stop,
        }
    }
}

fn main() {
    let args = Args::parse();
    let loaded = load_config(&args.config);

    let directive = match (&loaded, args.verbose) {
        (_, true) => "debug",
        (Ok(l), false) => l.config.shared.log_level.as_directive(),
        (Err(_), false) => "info",
    };
    setup_tracing(directive, args.json);

    info!("Rack supervisor v{} starting...", env!("CARGO_PKG_VERSION"));

    let result = loaded
        .map_err(|e| Box::new(e) as Box<dyn std::error::Error>)
        .and_then(|loaded| run(&args, loaded));
    if let Err(e) = result {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("Rack supervisor shutdown complete");
}

fn run(args: &Args, loaded: LoadedConfig) -> Result<(), Box<dyn std::error::Error>> {
    let config = loaded.config;
    let _span = info_span!("rack", service = %config.shared.service_name).entered();

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::Relaxed);
    })?;

    let transport = SimulatedRack::new(config.rack.module_count);
    warn!("No hardware transport configured, running against the simulated rack");

    let mut runner = CycleRunner::new(&config, transport);
    runner.controller_mut().set_start_stop(args.target.into());
    runner.run(&shutdown, args.cycles)?;

    if args.status {
        println!("{}", serde_json::to_string_pretty(&runner.controller().status())?);
    }
    Ok(())
}

fn setup_tracing(directive: &str, json: bool) {
    let level = directive.parse::<Level>().unwrap_or(Level::INFO);
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}
