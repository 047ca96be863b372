//! `filekeep` CLI (spec §6): the command surface consumed by the external
//! scanner/UI collaborator. Exit codes: `0` success, `1` engine error
//! (partial batch failures still report on stdout and exit 0), `2`
//! configuration error.

use clap::{Parser, Subcommand};
use comfy_table::{Cell, Table};
use filekeep_engine::config::EngineConfig;
use filekeep_engine::db::{acquire_db_lock, Database};
use filekeep_engine::orchestrator::Orchestrator;
use filekeep_engine::recovery::RecoveryCrawler;
use filekeep_engine::remote::http::HttpRemoteStore;
use filekeep_engine::remote::RemoteStore;
use filekeep_engine::verifier::Verifier;
use console::style;
use owo_colors::OwoColorize;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const CONFIG_EXIT_CODE: i32 = 2;
const ENGINE_ERROR_EXIT_CODE: i32 = 1;

#[derive(Parser)]
#[command(name = "filekeep", about = "Drives local files through the remote vector-index store")]
struct Cli {
    /// Override the default data directory (holds config, DB and lock files).
    #[arg(long, env = "FILEKEEP_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Raise the default log level to debug.
    #[arg(long)]
    verbose: bool,

    /// Emit machine-readable JSON instead of table output.
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one upload batch.
    Upload {
        #[arg(long, default_value_t = 100)]
        limit: u64,
        #[arg(long, default_value_t = 25)]
        batch_size: usize,
        #[arg(long, default_value_t = 8)]
        concurrency: usize,
        /// Reset (re-upload) already-INDEXED files instead of only
        /// UNTRACKED ones.
        #[arg(long)]
        reset_existing: bool,
        /// Skip the confirmation prompt triggered by `--reset-existing`.
        #[arg(long)]
        yes: bool,
    },
    /// Run the recovery crawler once.
    Recover,
    /// Move every FAILED row back to UNTRACKED.
    RetryFailed {
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
    /// Run the temporal stability verifier.
    VerifyStability,
}

#[derive(Deserialize)]
struct Credentials {
    api_key: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{}: {e:#}", "configuration error".red().bold());
            std::process::exit(CONFIG_EXIT_CODE);
        }
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    let data_dir = match cli.data_dir {
        Some(d) => d,
        None => EngineConfig::default_data_dir()?,
    };
    let config = EngineConfig::load(&data_dir)?;

    // Loading config, credentials or opening the DB are the only
    // operations allowed to abort with configuration exit code 2 (spec §2
    // [EXPANDED]).
    let _db_lock = acquire_db_lock(&config.db_path())?;
    let db = Database::open(&config.db_path()).await?;
    let remote = load_remote_store(&config)?;

    match cli.command {
        Commands::Upload { limit, batch_size, concurrency, reset_existing, yes } => {
            if reset_existing && !yes {
                use dialoguer::Confirm;
                let confirm = Confirm::new()
                    .with_prompt("This will re-upload already-INDEXED files. Continue?")
                    .default(false)
                    .interact()?;
                if !confirm {
                    println!("aborted");
                    return Ok(0);
                }
            }
            // Recovery runs before every batch (spec §4.6: "runs on engine
            // startup"), so a file left mid-reset by a prior crash is
            // resolved before the orchestrator can trip over its intent.
            RecoveryCrawler::new(db.conn().clone(), remote.clone()).run().await?;
            let orchestrator = Orchestrator::new(db.conn().clone(), remote, config);
            let report = orchestrator.run_batch(limit, batch_size, concurrency, reset_existing).await?;
            print_batch_report(&report, cli.json);
            Ok(0)
        }
        Commands::Recover => {
            let crawler = RecoveryCrawler::new(db.conn().clone(), remote);
            let report = crawler.run().await?;
            print_recovery_report(&report, cli.json);
            Ok(0)
        }
        Commands::RetryFailed { yes } => {
            if !yes {
                use dialoguer::Confirm;
                let confirm = Confirm::new()
                    .with_prompt("Move all FAILED files back to UNTRACKED?")
                    .default(false)
                    .interact()?;
                if !confirm {
                    println!("aborted");
                    return Ok(0);
                }
            }
            let crawler = RecoveryCrawler::new(db.conn().clone(), remote);
            let report = crawler.retry_failed().await?;
            if cli.json {
                println!("{}", serde_json::json!({ "requeued": report.requeued }));
            } else {
                println!("requeued {} file(s) for retry", report.requeued.len());
            }
            Ok(0)
        }
        Commands::VerifyStability => {
            let verifier = Verifier::new(db.conn().clone(), remote, config);
            let report = verifier.run().await?;
            print_verification_report(&report, cli.json);
            Ok(if report.all_passed() { 0 } else { ENGINE_ERROR_EXIT_CODE })
        }
    }
}

fn load_remote_store(config: &EngineConfig) -> anyhow::Result<Arc<dyn RemoteStore>> {
    let raw = std::fs::read_to_string(&config.remote.credentials_path).map_err(|e| {
        anyhow::anyhow!(
            "reading credentials file {}: {e}",
            config.remote.credentials_path.display()
        )
    })?;
    let credentials: Credentials = serde_json::from_str(&raw)?;
    Ok(Arc::new(HttpRemoteStore::new(config.remote.base_url.clone(), credentials.api_key)))
}

fn print_batch_report(report: &filekeep_engine::orchestrator::BatchReport, json: bool) {
    if json {
        println!(
            "{}",
            serde_json::json!({
                "indexed": report.indexed,
                "failed": report.failed,
                "occ_conflicts": report.occ_conflicts,
            })
        );
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["file", "outcome"]);
    for path in &report.indexed {
        table.add_row(vec![Cell::new(path), Cell::new("INDEXED")]);
    }
    for (path, reason) in &report.failed {
        table.add_row(vec![Cell::new(path), Cell::new(format!("FAILED: {reason}"))]);
    }
    for path in &report.occ_conflicts {
        table.add_row(vec![Cell::new(path), Cell::new("SKIPPED (occ conflict)")]);
    }
    println!("{table}");
    println!(
        "{} indexed, {} failed, {} skipped",
        report.indexed.len().to_string().green(),
        report.failed.len().to_string().red(),
        report.occ_conflicts.len().to_string().yellow()
    );
}

fn print_recovery_report(report: &filekeep_engine::recovery::RecoveryReport, json: bool) {
    if json {
        println!(
            "{}",
            serde_json::json!({
                "resumed": report.resumed,
                "occ_conflicts": report.occ_conflicts,
                "skipped_unknown_intent": report.skipped_unknown_intent,
            })
        );
        return;
    }
    println!(
        "recovered {} file(s), {} occ conflict(s) deferred to next pass",
        report.resumed.len(),
        report.occ_conflicts.len()
    );
}

fn print_verification_report(report: &filekeep_engine::verifier::VerificationReport, json: bool) {
    if json {
        let assertions: Vec<_> = report
            .assertions
            .iter()
            .map(|a| serde_json::json!({ "name": a.name, "passed": a.passed, "detail": a.detail }))
            .collect();
        println!("{}", serde_json::json!({ "assertions": assertions }));
        return;
    }

    println!("{}", style("temporal stability verification").bold());
    let mut table = Table::new();
    table.set_header(vec!["assertion", "result", "detail"]);
    for assertion in &report.assertions {
        let result = if assertion.passed {
            "PASS".green().to_string()
        } else {
            "FAIL".red().to_string()
        };
        table.add_row(vec![Cell::new(assertion.name), Cell::new(result), Cell::new(&assertion.detail)]);
    }
    println!("{table}");
}
