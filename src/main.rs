use anyhow::{Context, Result};
use std::io::{BufWriter, Write};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use storemon::cli::{parse_args, print_help};
use storemon::config::Config;
use storemon::report::{reference_instant, run_report};
use storemon::Dataset;

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args();

    if args.help {
        print_help();
        return Ok(());
    }

    // Initialize logging (stderr, so stdout stays machine-readable)
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("storemon=info".parse()?),
        )
        .init();

    info!("storemon v{}", env!("CARGO_PKG_VERSION"));

    if !args.errors.is_empty() {
        for e in &args.errors {
            error!("{}", e);
        }
        std::process::exit(1);
    }

    // Load configuration
    let mut config = Config::from_env()?;
    if let Some(input) = args.input {
        config.data_path = Some(input);
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    info!("Configuration loaded");
    info!("  Default timezone: {}", config.default_timezone);
    info!("  Workers: {}", config.workers);

    if let Err(e) = config.validate() {
        error!("{}", e);
        std::process::exit(1);
    }
    if args.validate {
        info!("Configuration is valid");
        return Ok(());
    }

    let path = config
        .data_path
        .clone()
        .context("no dataset snapshot given (use --input or STOREMON_DATA_PATH)")?;
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read dataset snapshot '{}'", path))?;
    let dataset = Dataset::from_json(&raw)
        .with_context(|| format!("failed to parse dataset snapshot '{}'", path))?
        .with_default_timezone(config.default_timezone.clone());

    let now = match reference_instant(&dataset) {
        Ok(now) => now,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };
    info!(
        "Dataset: {} stores, {} observations, reference instant {}",
        dataset.store_ids().len(),
        dataset.observation_count(),
        now.to_rfc3339()
    );

    // Ctrl-C abandons the batch; finished stores are still written
    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping report");
            ctrl_c.cancel();
        }
    });

    let report = run_report(Arc::new(dataset), now, config.workers, cancel).await;

    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for row in report.rows() {
        serde_json::to_writer(&mut out, &row)?;
        writeln!(out)?;
    }
    out.flush()?;

    if !report.failures.is_empty() {
        warn!("{} stores failed, see rows with status \"error\"", report.failures.len());
    }

    Ok(())
}
