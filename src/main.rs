//! visit-check - end-to-end checks of visit grouping and the visits report
//!
//! Drives a monitoring service API through named scenarios:
//! - `domain/` - Identifiers, expected visits, JSON response shapes
//! - `io/` - Monitoring API trait and its HTTP implementation
//! - `services/` - Scenario builder, report parser and checkers
//! - `infra/` - Configuration

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;
use visit_check::infra::Config;
use visit_check::io::HttpApi;
use visit_check::services::scenarios;

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")");

/// Visit report checker - runs visit scenarios against a monitoring API
#[derive(Parser, Debug)]
#[command(name = "visit-check", version = VERSION, about)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, env = "CONFIG_FILE", default_value = "config/dev.toml")]
    config: String,

    /// Scenario to run: "all" or comma separated names
    #[arg(short, long, default_value = "all")]
    scenario: String,

    /// Debug logging when RUST_LOG is not set
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    info!(version = %VERSION, "visit_check_starting");

    match run(&args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            error!(error = %format!("{:#}", e), "run_failed");
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

async fn run(args: &Args) -> anyhow::Result<bool> {
    let config = Config::load_from_path(&args.config);
    info!(
        config_file = %config.config_file(),
        api = %config.api_base_url(),
        timezone = %config.report_timezone(),
        interval_secs = config.visit_interval_secs(),
        "config_loaded"
    );

    let selected = scenarios::select(&args.scenario)?;
    let api = HttpApi::new(&config)?;

    println!("Running {} scenario(s)", selected.len());
    println!();

    let mut failed = Vec::new();
    for scenario in &selected {
        println!("Running: {} - {}", scenario.name, scenario.description);
        match scenario.run(&api, &config).await {
            Ok(()) => println!("  ✓ PASSED"),
            Err(e) => {
                println!("  ✗ FAILED: {:#}", e);
                error!(scenario = %scenario.name, error = %format!("{:#}", e), "scenario_failed");
                failed.push(scenario.name);
            }
        }
    }

    println!();
    println!("Results: {} passed, {} failed", selected.len() - failed.len(), failed.len());
    if !failed.is_empty() {
        println!("Failed: {}", failed.join(", "));
    }
    Ok(failed.is_empty())
}
