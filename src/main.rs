//! venmo-cashout entry point.
//!
//! Loads `.env` and flags, initialises structured logging, builds the Venmo
//! and Lunch Money clients and runs a single cashout. Any failure exits
//! non-zero with a message naming the stage that failed.

use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, error, info, Level};

use venmo_cashout::cli::{self, Args};
use venmo_cashout::config::{AppConfig, CashoutConfig};
use venmo_cashout::engine::CashoutRunner;
use venmo_cashout::platforms::venmo::VenmoClient;
use venmo_cashout::platforms::PaymentPlatform;
use venmo_cashout::rules::lunchmoney::LunchMoneyClient;

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    init_logging();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{e:#}"), "Cashout failed");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let args = Args::parse(std::env::args().skip(1))?;
    if args.help {
        println!("{}", cli::USAGE);
        return Ok(());
    }

    let resolved = args.resolve(AppConfig::resolve_env)?;

    let app = match resolved.config.as_deref() {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    let venmo = VenmoClient::new(resolved.token, &app.venmo)?;
    let lunchmoney = LunchMoneyClient::new(&app.lunchmoney)?;

    let config = CashoutConfig {
        dry_run: resolved.dry_run,
        quiet: resolved.quiet,
        settle_delay: Duration::from_secs(app.cashout.settle_delay_secs),
        finance_credentials: resolved.finance_credentials,
    };

    info!(
        platform = venmo.name(),
        dry_run = config.dry_run,
        settle_delay_secs = config.settle_delay.as_secs(),
        lunchmoney = config.finance_credentials.is_some(),
        "Starting cashout"
    );

    let runner = CashoutRunner::new(venmo, lunchmoney, config);
    let report = runner.run().await?;

    info!(
        run_id = %report.run_id,
        outcome = %report.outcome,
        balance = %report.balance,
        transfers = report.transfers.len(),
        remainder = %report.plan.remainder,
        rules = ?report.rules_created,
        dry_run = runner.config().dry_run,
        "Cashout finished"
    );

    if tracing::enabled!(Level::DEBUG) {
        debug!(report = %serde_json::to_string(&report)?, "Cashout report");
    }

    Ok(())
}

/// Initialise the `tracing` subscriber.
///
/// Logs go to stderr so stdout carries only the cashout report.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("venmo_cashout=warn"));

    let json_logging = std::env::var("CASHOUT_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }
}
