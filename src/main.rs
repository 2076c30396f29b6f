//! Circuit breaker simulator.
//!
//! Drives a simulated flaky dependency through a breaker so its state
//! transitions can be watched in the logs.
//!
//! ```text
//! circuit-guard simulate --calls 40 --failure-rate 0.8 --heal-after 20
//! circuit-guard check-config guard.toml
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Serialize;

use circuit_guard::config::loader::load_config;
use circuit_guard::observability::logging::init_logging;
use circuit_guard::{BreakerError, BreakerSnapshot, CircuitBreaker, GuardConfig};

#[derive(Parser)]
#[command(name = "circuit-guard")]
#[command(about = "Circuit breaker simulator and config checker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulated flaky dependency through a breaker
    Simulate(SimulateArgs),
    /// Load and validate a config file, then print it
    CheckConfig {
        /// Path to the TOML config
        path: PathBuf,
    },
}

#[derive(clap::Args)]
struct SimulateArgs {
    /// Optional TOML config; flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of guarded calls to make
    #[arg(long, default_value_t = 40)]
    calls: u32,

    /// Probability (0.0-1.0) that a call to the dependency fails
    #[arg(long, default_value_t = 0.7)]
    failure_rate: f64,

    /// Dependency stops failing after this many calls
    #[arg(long)]
    heal_after: Option<u32>,

    /// Pause between calls in milliseconds
    #[arg(long, default_value_t = 25)]
    interval_ms: u64,

    /// Override the breaker threshold
    #[arg(long)]
    threshold: Option<u32>,

    /// Override the breaker recovery timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,
}

/// Failure of one simulated call.
#[derive(Debug, thiserror::Error)]
enum CallError {
    #[error("dependency failed on call {0}")]
    Dependency(u32),

    #[error(transparent)]
    Breaker(#[from] BreakerError),
}

#[derive(Serialize)]
struct Summary {
    succeeded: u32,
    failed: u32,
    rejected: u32,
    breaker: BreakerSnapshot,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate(args) => simulate(args).await,
        Commands::CheckConfig { path } => {
            let config = load_config(&path)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

async fn simulate(args: SimulateArgs) -> Result<(), Box<dyn std::error::Error>> {
    if !(0.0..=1.0).contains(&args.failure_rate) {
        return Err(format!("failure rate {} is outside 0.0..=1.0", args.failure_rate).into());
    }

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => GuardConfig::default(),
    };
    if let Some(threshold) = args.threshold {
        config.breaker.threshold = threshold;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.breaker.timeout_ms = timeout_ms;
    }
    if args.config.is_none() && args.timeout_ms.is_none() {
        // Keep the default run short enough to see a recovery.
        config.breaker.timeout_ms = 200;
    }

    init_logging(&config.observability)?;

    let breaker = CircuitBreaker::from_config(&config.breaker)?;
    tracing::info!(
        breaker = %breaker.name(),
        threshold = breaker.threshold(),
        timeout_ms = config.breaker.timeout_ms,
        calls = args.calls,
        failure_rate = args.failure_rate,
        "Simulation starting"
    );

    let interval = Duration::from_millis(args.interval_ms);
    let (mut succeeded, mut failed, mut rejected) = (0, 0, 0);

    for call in 1..=args.calls {
        let healed = args.heal_after.is_some_and(|n| call > n);
        let failure_rate = if healed { 0.0 } else { args.failure_rate };

        let outcome = breaker
            .attempt_async(move || async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                if fastrand::f64() < failure_rate {
                    Err(CallError::Dependency(call))
                } else {
                    Ok(call)
                }
            })
            .await;

        match outcome {
            Ok(_) => succeeded += 1,
            Err(CallError::Dependency(_)) => failed += 1,
            Err(CallError::Breaker(e)) if e.is_circuit_open() => rejected += 1,
            Err(CallError::Breaker(e)) => return Err(e.into()),
        }

        tracing::debug!(call, state = %breaker.state(), failures = breaker.failures(), "Call finished");
        tokio::time::sleep(interval).await;
    }

    let summary = Summary {
        succeeded,
        failed,
        rejected,
        breaker: breaker.snapshot(),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
