//! bq-transfer CLI - BigQuery to Cloud Storage to BigQuery transfer.

use bq_transfer::pipeline::new_run_id;
use bq_transfer::{Config, Orchestrator, RunPlan, Step, TransferError};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "bq-transfer")]
#[command(about = "BigQuery to Cloud Storage to BigQuery transfer")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Path to state file recording attempts and steps
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    /// Run identifier (default: random UUID)
    #[arg(long)]
    run_id: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute one run: query, export, load
    Run {
        /// Dry run: validate and show plan without calling any service
        #[arg(long)]
        dry_run: bool,

        /// Override number of whole-run retries
        #[arg(long)]
        retries: Option<u32>,

        /// Keep the temporary table and export object after the load
        #[arg(long)]
        no_cleanup: bool,
    },

    /// Show the resolved plan without calling any service
    Plan,

    /// Check access to the source table, destination table and bucket
    HealthCheck,

    /// Load and validate the configuration file
    ValidateConfig,
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

async fn run() -> Result<(), TransferError> {
    let cli = Cli::parse();

    // Setup logging
    setup_logging(&cli.verbosity, &cli.log_format).map_err(TransferError::Config)?;

    let mut config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    let run_id = cli.run_id.clone().unwrap_or_else(new_run_id);

    match cli.command {
        Commands::ValidateConfig => {
            if cli.output_json {
                println!(
                    "{}",
                    serde_json::json!({ "valid": true, "config_hash": config.hash() })
                );
            } else {
                println!("Configuration is valid");
                println!("  DAG: {} (owner {})", config.dag_id, config.owner);
                println!(
                    "  Start date: {}",
                    config.effective_start_date().to_rfc3339()
                );
                println!(
                    "  Schedule: {}",
                    config.schedule.as_deref().unwrap_or("none")
                );
                println!("  Hash: {}", config.hash());
            }
        }

        Commands::Plan => {
            let plan = RunPlan::from_config(&config, &run_id)?;
            print_plan(&plan, cli.output_json)?;
        }

        Commands::Run {
            dry_run,
            retries,
            no_cleanup,
        } => {
            // Apply overrides
            if let Some(r) = retries {
                config.run.retries = r;
            }
            if no_cleanup {
                config.run.cleanup = false;
            }

            if dry_run {
                let plan = RunPlan::from_config(&config, &run_id)?;
                print_plan(&plan, cli.output_json)?;
                if !cli.output_json {
                    println!("\nDry run: no service was called.");
                }
                return Ok(());
            }

            let mut orchestrator = Orchestrator::connect(config)?.with_run_id(run_id);
            if let Some(ref path) = cli.state_file {
                orchestrator = orchestrator.with_state_file(path.clone());
            }

            // Setup signal handling for graceful shutdown (SIGINT and SIGTERM)
            let cancel_token = setup_signal_handler();

            let result = orchestrator.run(cancel_token).await?;

            if cli.output_json {
                println!("{}", result.to_json()?);
            } else {
                println!("\nRun completed!");
                println!("  Run ID: {}", result.run_id);
                println!("  DAG: {} (owner {})", result.dag_id, result.owner);
                println!("  Attempts: {}", result.attempts);
                println!("  Duration: {:.2}s", result.duration_seconds);
                println!("  Rows queried: {}", result.rows_queried);
                println!("  Rows exported: {}", result.rows_exported);
                println!("  Rows loaded: {}", result.rows_loaded);
                if result.bad_records > 0 {
                    println!("  Malformed rows skipped: {}", result.bad_records);
                }
                println!("  Temporary table: {}", result.temporary_table);
                println!("  Export: {}", result.export_uri);
            }
        }

        Commands::HealthCheck => {
            let orchestrator = Orchestrator::connect(config)?;
            let result = orchestrator.health_check().await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                for check in &result.checks {
                    println!(
                        "  {} {}: {} ({}ms)",
                        check.name,
                        check.resource,
                        if check.ok { "OK" } else { "FAILED" },
                        check.latency_ms
                    );
                    if let Some(ref err) = check.error {
                        println!("    Error: {}", err);
                    }
                }
                println!(
                    "\n  Overall: {}",
                    if result.healthy { "HEALTHY" } else { "UNHEALTHY" }
                );
            }

            if !result.healthy {
                return Err(TransferError::Connectivity("Health check failed".to_string()));
            }
        }
    }

    Ok(())
}

fn print_plan(plan: &RunPlan, json: bool) -> Result<(), TransferError> {
    if json {
        println!("{}", serde_json::to_string_pretty(plan)?);
        return Ok(());
    }

    println!("Plan for run {}", plan.run_id);
    for step in plan.steps() {
        let detail = match step {
            Step::Start | Step::End => String::new(),
            Step::Query => format!(
                "{} -> {} ({})",
                plan.query.select.to_sql(),
                plan.temporary_table,
                plan.query.write_disposition.as_api_str()
            ),
            Step::Export => format!(
                "{} -> {} (CSV, delimiter {:?}, header: {})",
                plan.temporary_table,
                plan.export_uri,
                plan.extract.field_delimiter,
                plan.extract.print_header
            ),
            Step::Load => format!(
                "{} -> {} ({}, skip {}, max bad records {})",
                plan.export_uri,
                plan.destination,
                plan.load.write_disposition.as_api_str(),
                plan.load.skip_leading_rows,
                plan.load.max_bad_records
            ),
            Step::Cleanup if plan.cleanup => {
                format!("delete {}, {}", plan.temporary_table, plan.export_uri)
            }
            Step::Cleanup => "skipped".to_string(),
        };
        println!("  {:<15} {}", step.task_id(), detail);
    }
    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so --output-json stays parseable.
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().try_init().map_err(|e| e.to_string())
    } else {
        subscriber.try_init().map_err(|e| e.to_string())
    }
}

/// Setup signal handlers for graceful shutdown.
/// Handles both SIGINT (Ctrl-C) and SIGTERM (scheduler shutdown).
/// Returns a CancellationToken that will be cancelled when a signal is received.
#[cfg(unix)]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();

    for (kind, name) in [
        (SignalKind::interrupt(), "SIGINT"),
        (SignalKind::terminate(), "SIGTERM"),
    ] {
        let token = cancel_token.clone();
        tokio::spawn(async move {
            match signal(kind) {
                Ok(mut stream) => {
                    stream.recv().await;
                    eprintln!("\nReceived {}. Cancelling run...", name);
                    token.cancel();
                }
                Err(e) => warn!("Could not install {} handler: {}", name, e),
            }
        });
    }

    cancel_token
}

/// Setup signal handler for Windows (only Ctrl-C)
#[cfg(not(unix))]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                eprintln!("\nReceived Ctrl-C. Cancelling run...");
                token.cancel();
            }
            Err(e) => warn!("Could not install Ctrl-C handler: {}", e),
        }
    });

    cancel_token
}
