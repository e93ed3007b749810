//! mssql-pg-reconcile CLI - Row-level MSSQL to PostgreSQL reconciliation.

use clap::{Parser, Subcommand};
use mssql_pg_reconcile::error::{EXIT_DATABASE_ERROR, EXIT_NOT_RECONCILED};
use mssql_pg_reconcile::{
    ComparisonResult, Config, HashAlgorithm, Orchestrator, ReconcileError, RunSummary,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "mssql-pg-reconcile")]
#[command(about = "Row-level reconciliation of MSSQL and PostgreSQL tables")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, env = "RECONCILE_CONFIG", default_value = "config.yaml")]
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

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile the configured tables row by row
    Run {
        /// Override table mapping (SRC.TABLE=tgt.table,... or ALL)
        #[arg(long)]
        tables: Option<String>,

        /// Override hash algorithm (MD5 or SHA256)
        #[arg(long)]
        hash_algorithm: Option<HashAlgorithm>,

        /// Override the row cap per table and side
        #[arg(long)]
        max_rows_per_table: Option<u64>,

        /// Write per-row hashes to CSV files in this directory
        #[arg(long)]
        csv_export_dir: Option<PathBuf>,
    },

    /// Test database connections
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode, ReconcileError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let mut config = Config::load(&cli.config)?.with_process_env()?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Run {
            tables,
            hash_algorithm,
            max_rows_per_table,
            csv_export_dir,
        } => {
            // Apply overrides
            if let Some(tables) = tables {
                config.reconcile.tables = tables;
            }
            if let Some(alg) = hash_algorithm {
                config.reconcile.hash_algorithm = alg;
            }
            if let Some(cap) = max_rows_per_table {
                config.reconcile.max_rows_per_table = Some(cap);
            }
            if let Some(dir) = csv_export_dir {
                config.reconcile.csv_export_dir = Some(dir);
            }
            config.validate()?;

            let summary = Orchestrator::new(&config).run().await?;

            if cli.output_json {
                println!("{}", summary.to_json()?);
            } else {
                print_summary(&summary);
            }

            if summary.is_pass() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::from(EXIT_NOT_RECONCILED))
            }
        }

        Commands::HealthCheck => {
            let result = Orchestrator::new(&config).health_check().await;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  Source ({}): {} ({}ms, {} tables)",
                    config.source.describe(),
                    if result.source_connected { "OK" } else { "FAILED" },
                    result.source_latency_ms,
                    result.source_tables
                );
                if let Some(ref err) = result.source_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "  Target ({}): {} ({}ms, {} tables)",
                    config.target.describe(),
                    if result.target_connected { "OK" } else { "FAILED" },
                    result.target_latency_ms,
                    result.target_tables
                );
                if let Some(ref err) = result.target_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "\n  Overall: {}",
                    if result.healthy { "HEALTHY" } else { "UNHEALTHY" }
                );
            }

            if result.healthy {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::from(EXIT_DATABASE_ERROR))
            }
        }
    }
}

fn print_summary(summary: &RunSummary) {
    println!("\nReconciliation Results ({}):", summary.hash_algorithm);
    for table in &summary.tables {
        print_table(table);
    }

    println!("\nSummary:");
    println!("  Run ID: {}", summary.run_id);
    println!("  Tables matched: {}", summary.tables_matched);
    println!(
        "  Tables with differences: {}",
        summary.tables_with_differences
    );
    println!("  Tables errored: {}", summary.tables_errored);
    println!(
        "  Rows: {} source, {} target, {} matching ({:.2}%)",
        summary.total_source_rows,
        summary.total_target_rows,
        summary.total_matching_rows,
        summary.match_percentage()
    );
    println!("  Duration: {:.2}s", summary.duration_ms as f64 / 1000.0);
    println!(
        "\n  Overall: {}",
        if summary.is_pass() { "PASS" } else { "FAIL" }
    );
}

fn print_table(result: &ComparisonResult) {
    let status = if result.is_error() {
        "ERROR"
    } else if result.is_match() {
        "MATCH"
    } else {
        "DIFFERS"
    };
    println!("  [{}] {}", status, result.label());

    if let Some(ref err) = result.error {
        println!("    Error: {}", err);
        return;
    }

    println!(
        "    rows: {} source, {} target | matching: {} ({:.2}%) | mismatched: {} | missing: {} | extra: {}",
        result.source_row_count,
        result.target_row_count,
        result.matching_rows,
        result.match_percentage(),
        result.mismatched_rows,
        result.missing_rows,
        result.extra_rows
    );
    if result.source_truncated || result.target_truncated {
        println!("    note: row cap reached, remaining rows were not compared");
    }
    for outcome in result
        .mismatches
        .iter()
        .chain(&result.missing)
        .chain(&result.extra)
    {
        println!("    - {}", outcome);
    }
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
