//! Pricing Snapshot CLI
//!
//! Prices a YAML cart scenario and prints its receipt.

use std::{
    io::{self, Write},
    path::PathBuf,
    process::ExitCode,
    time::Instant,
};

use clap::{Parser, ValueEnum};
use humanize_duration::{Truncate, prelude::DurationExt};
use thiserror::Error;
use tracing::error;
use tracing_subscriber::EnvFilter;

use pricing_snapshot::{
    fixtures::{Fixture, FixtureError},
    receipt::{Receipt, ReceiptError},
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Compact,
    Json,
}

/// Price a cart scenario and print its receipt
#[derive(Debug, Parser)]
#[command(name = "pricing-snapshot", about = "Price a cart scenario", long_about = None)]
struct Args {
    /// Cart scenario to price, read from `<fixtures-dir>/carts/<name>.yml`
    #[arg(short, long, default_value = "basic")]
    fixture: String,

    /// Fixture directory
    #[arg(short = 'd', long, env = "PRICING_FIXTURES_DIR", default_value = "./fixtures")]
    fixtures_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "RUST_LOG", default_value = "warn")]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Fixture(#[from] FixtureError),

    #[error(transparent)]
    Receipt(#[from] ReceiptError),

    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

fn init_tracing(args: &Args) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);

    match args.log_format {
        LogFormat::Compact => subscriber.compact().init(),
        LogFormat::Json => subscriber.json().init(),
    }
}

fn run(args: &Args) -> Result<(), CliError> {
    let scenario = Fixture::with_base_path(&args.fixtures_dir).load_cart(&args.fixture)?;

    let start = Instant::now();
    let priced = scenario.price()?;
    let elapsed = start.elapsed();

    let stdout = io::stdout();
    let mut handle = stdout.lock();

    Receipt::new(&priced.snapshot, scenario.cart())
        .with_recurring(&priced.recurring)
        .write_to(&mut handle)?;

    for (rule, uses) in &priced.coupon_uses {
        writeln!(handle, " Coupon uses for rule {rule}: {uses}")?;
    }

    if !priced.rejected.is_empty() {
        writeln!(handle, " Rejected decisions: {}", priced.rejected.len())?;
    }

    writeln!(
        handle,
        " {} ({}s)",
        elapsed.human(Truncate::Nano),
        elapsed.as_secs_f32()
    )?;

    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    init_tracing(&args);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!(%error, fixture = %args.fixture, "unable to price cart");

            ExitCode::FAILURE
        }
    }
}
