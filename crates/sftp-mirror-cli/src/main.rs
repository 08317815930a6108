mod commands;
mod logging;
mod progress;

use std::process::ExitCode;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands};
use dotenv::dotenv;
use progress::CliReporter;
use sftp_mirror_core::remote::sftp;
use sftp_mirror_core::{AppConfig, CatalogRecord, CatalogWriter, Database, MirrorEngine, RunReport};
use tracing::{error, info};

const EXIT_ABORTED: u8 = 1;
const EXIT_FETCH_FAILURES: u8 = 2;

fn main() -> ExitCode {
    dotenv().ok();

    // Dropped when main returns, which flushes the log file writer.
    let _guard = logging::init_logger();

    let args = Cli::parse();

    match dispatch(args) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            error!("Error: {:#}", err);
            ExitCode::from(EXIT_ABORTED)
        }
    }
}

fn dispatch(args: Cli) -> anyhow::Result<u8> {
    let mut config = match sftp_mirror_core::config::load_configuration(&args.config) {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            return Ok(EXIT_ABORTED);
        }
    };

    match args.command {
        Some(Commands::Run {
            workers,
            fail_on_error,
        }) => {
            if let Some(workers) = workers {
                config.transfer.workers = workers.max(1);
            }
            match run_mirror(&config) {
                Ok(report) => {
                    print_report(&report);
                    if fail_on_error && report.has_failures() {
                        return Ok(EXIT_FETCH_FAILURES);
                    }
                }
                Err(err) => {
                    error!("Mirror run aborted: {:#}", err);
                    return Ok(EXIT_ABORTED);
                }
            }
        }
        Some(Commands::Catalog { filename }) => {
            let db = Database::open(&config.catalog.path)
                .with_context(|| format!("opening catalog {}", config.catalog.path))?;
            let records = match filename {
                Some(name) => db.history(&name)?,
                None => db.list_all()?,
            };
            if records.is_empty() {
                println!("Catalog is empty");
            }
            print_records(&records);
        }
        Some(Commands::PrintConfig) => {
            println!("{}", toml::to_string_pretty(&config.redacted())?);
        }
        None => {
            let _ = Cli::command().print_long_help();
        }
    }

    Ok(0)
}

fn run_mirror(config: &AppConfig) -> anyhow::Result<RunReport> {
    info!(
        "Connecting to {}@{}:{}",
        config.remote.username, config.remote.host, config.remote.port
    );
    let connection = sftp::connect(&config.remote)?;
    let db = Database::open(&config.catalog.path)
        .with_context(|| format!("opening catalog {}", config.catalog.path))?;

    let engine = MirrorEngine::from_config(config);
    let reporter = CliReporter::new();
    let report = engine.run(&connection, &db, &reporter)?;
    Ok(report)
}

fn print_report(report: &RunReport) {
    println!();
    for outcome in &report.outcomes {
        match outcome.error {
            None => println!(
                "  {} {} ({} bytes)",
                "✓".green(),
                outcome.entry.relative_path,
                outcome.bytes_copied
            ),
            Some(ref e) => println!("  {} {}: {}", "✗".red(), outcome.entry.relative_path, e),
        }
    }
    if report.cancelled {
        println!(
            "  {} {} of {} entries were not fetched",
            "!".yellow(),
            report.planned - report.outcomes.len(),
            report.planned
        );
    }

    match report.catalog_listing {
        Ok(ref records) => {
            println!();
            print_records(records);
        }
        Err(ref e) => error!("Could not read back the catalog: {}", e),
    }

    println!();
    info!(
        "List: {}, Fetch: {}, Catalog: {}",
        format!("{:.2}s", report.listing_duration.as_secs_f64()).green(),
        format!("{:.2}s", report.fetch_duration.as_secs_f64()).green(),
        format!("{:.2}s", report.catalog_duration.as_secs_f64()).green(),
    );
    info!(
        "{} fetched ({} bytes), {} failed, {} cataloged",
        format!("{}", report.successes().count()).green(),
        report.bytes_copied(),
        format!("{}", report.failures().count()).red(),
        format!("{}", report.cataloged).cyan(),
    );
}

fn print_records(records: &[CatalogRecord]) {
    for record in records {
        println!(
            "{:>6}  {}  {}",
            record.id,
            record.filename,
            record.fetched_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
}
