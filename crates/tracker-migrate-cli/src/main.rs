//! tracker-migrate CLI - legacy TSSE tracker to UNIT3D migration.

use clap::{Parser, Subcommand};
use std::future::Future;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;
use tracker_migrate::{Config, EntityKind, MigrateError, MigrationResult, Migrator, RunReport};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "tracker-migrate")]
#[command(about = "Chunked migration of a legacy TSSE tracker database into UNIT3D")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    /// Seconds an in-flight run may keep going after SIGINT/SIGTERM
    #[arg(long, default_value = "60")]
    shutdown_timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate entities from the legacy database
    Run {
        /// Entity to migrate (repeatable); defaults to the configured list
        #[arg(long = "entity", value_name = "ENTITY")]
        entities: Vec<EntityKind>,

        /// Dry run: read and transform everything, write nothing
        #[arg(long)]
        dry_run: bool,
    },

    /// Show source tables and row counts per entity
    Summary,

    /// Test database connections
    HealthCheck,
}

/// Wait up to `grace` for an interrupted run. On timeout the connections
/// are closed before the run is reported as cancelled.
async fn finish_or_close<T>(
    run: impl Future<Output = T>,
    grace: Duration,
    close: impl Future<Output = ()>,
) -> Result<T, MigrateError> {
    match tokio::time::timeout(grace, run).await {
        Ok(output) => Ok(output),
        Err(_) => {
            close.await;
            Err(MigrateError::Cancelled)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    // Setup signal handling for graceful shutdown (SIGINT and SIGTERM)
    let cancel_token = setup_signal_handler()?;

    match cli.command {
        Commands::Run { entities, dry_run } => {
            let migrator = Migrator::connect(config, dry_run).await?;

            let run = migrator.run(&entities);
            tokio::pin!(run);
            let report = tokio::select! {
                report = &mut run => report,
                _ = cancel_token.cancelled() => {
                    warn!(
                        "Shutdown requested, waiting up to {}s for the current run",
                        cli.shutdown_timeout
                    );
                    let grace = Duration::from_secs(cli.shutdown_timeout);
                    finish_or_close(&mut run, grace, migrator.close()).await?
                }
            };
            migrator.close().await;

            if cli.output_json {
                println!("{}", report.to_json()?);
            } else {
                print_report(&report);
            }

            if !report.is_success() {
                return Err(MigrateError::EntitiesFailed(
                    report
                        .failed_entities
                        .iter()
                        .map(|k| k.to_string())
                        .collect(),
                ));
            }
        }

        Commands::Summary => {
            // The destination is not needed; the dry-run target never connects.
            let migrator = Migrator::connect(config, true).await?;
            let summary = migrator.summary().await?;
            migrator.close().await;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("Source Summary:");
                for entry in &summary {
                    match (&entry.table, entry.rows) {
                        (Some(table), Some(rows)) => {
                            println!("  {:<18} {:<16} {} rows", entry.entity, table, rows)
                        }
                        _ => println!("  {:<18} (no source table)", entry.entity),
                    }
                }
            }
        }

        Commands::HealthCheck => {
            let migrator = Migrator::connect(config, false).await?;
            let result = migrator.health_check().await?;
            migrator.close().await;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  Source (legacy): {} ({}ms)",
                    if result.source_connected { "OK" } else { "FAILED" },
                    result.source_latency_ms
                );
                if let Some(ref err) = result.source_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "  Target (UNIT3D): {} ({}ms)",
                    if result.target_connected { "OK" } else { "FAILED" },
                    result.target_latency_ms
                );
                if let Some(ref err) = result.target_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "\n  Overall: {}",
                    if result.healthy { "HEALTHY" } else { "UNHEALTHY" }
                );
            }

            if !result.healthy {
                return Err(MigrateError::Unhealthy);
            }
        }
    }

    Ok(())
}

fn print_report(report: &RunReport) {
    let status_msg = if report.dry_run {
        "Dry run completed!"
    } else {
        "Migration completed!"
    };
    println!("\n{}", status_msg);
    println!("  Run ID: {}", report.run_id);
    println!("  Duration: {:.2}s", report.duration_seconds);
    for outcome in &report.entities {
        println!("  {:<18} {}", outcome.entity, describe(&outcome.result));
    }
    println!("  Records: {}", report.total_count);
    if !report.failed_entities.is_empty() {
        println!("  Failed entities: {:?}", report.failed_entities);
    }
}

fn describe(result: &MigrationResult) -> String {
    match &result.error {
        None => format!("OK, {} records", result.count),
        Some(err) => format!("FAILED after {} records: {}", result.count, err),
    }
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => "debug",
        "warn" => "warn",
        "error" => "error",
        _ => "info",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Setup signal handlers for graceful shutdown.
/// Handles both SIGINT (Ctrl-C) and SIGTERM.
/// Returns a CancellationToken that will be cancelled when a signal is received.
#[cfg(unix)]
fn setup_signal_handler() -> Result<CancellationToken, MigrateError> {
    let cancel_token = CancellationToken::new();

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    let token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = sigint.recv() => eprintln!("\nReceived SIGINT. Shutting down gracefully..."),
            _ = sigterm.recv() => eprintln!("\nReceived SIGTERM. Shutting down gracefully..."),
        }
        token.cancel();
    });

    Ok(cancel_token)
}

/// Setup signal handler for Windows (only Ctrl-C)
#[cfg(not(unix))]
fn setup_signal_handler() -> Result<CancellationToken, MigrateError> {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nReceived Ctrl-C. Shutting down gracefully...");
            token.cancel();
        }
    });

    Ok(cancel_token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn test_shutdown_timeout_closes_before_cancelling() {
        let closed = AtomicBool::new(false);
        let result = finish_or_close(
            std::future::pending::<u32>(),
            Duration::from_millis(10),
            async { closed.store(true, Ordering::SeqCst) },
        )
        .await;

        assert!(matches!(result, Err(MigrateError::Cancelled)));
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_run_finishing_in_time_is_not_closed_early() {
        let closed = AtomicBool::new(false);
        let result = finish_or_close(
            std::future::ready(7u32),
            Duration::from_secs(5),
            async { closed.store(true, Ordering::SeqCst) },
        )
        .await;

        assert_eq!(result.unwrap(), 7);
        assert!(!closed.load(Ordering::SeqCst));
    }
}
