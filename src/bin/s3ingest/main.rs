use anyhow::{Context, Result, anyhow};
use clap::Parser;
use std::path::Path;
use tokio::io::AsyncReadExt;
use tracing::{debug, error, trace, warn};

use s3ingest_rs::config::Config;
use s3ingest_rs::config::args::{CLIArgs, Command};
use s3ingest_rs::storage::create_storage;
use s3ingest_rs::tagging::create_tag_query;
use s3ingest_rs::types::error::{exit_code_from_error, is_partial_failure};
use s3ingest_rs::{BatchDispatcher, S3IngestError, TagReportGenerator};

mod tracing_init;

/// s3ingest - S3 ingestion utilities.
///
/// This binary is a thin wrapper over the s3ingest-rs library.
/// All core functionality is implemented in the library crate.
#[cfg_attr(coverage_nightly, coverage(off))]
#[tokio::main]
async fn main() {
    let (command, config) = load_config_exit_if_err();

    start_tracing_if_necessary(&config);

    trace!("config = {:?}", config);

    if let Err(e) = run(command, config).await {
        if !is_partial_failure(&e) {
            error!("{:#}", e);
            eprintln!("s3ingest failed: {e:#}");
        }
        std::process::exit(exit_code_from_error(&e));
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
fn load_config_exit_if_err() -> (Command, Config) {
    let args = CLIArgs::parse();
    let command = args.command.clone();
    match Config::try_from(args) {
        Ok(config) => (command, config),
        Err(error_message) => {
            clap::Error::raw(clap::error::ErrorKind::ValueValidation, error_message).exit()
        }
    }
}

fn start_tracing_if_necessary(config: &Config) -> bool {
    let Some(tracing_config) = config.tracing_config.as_ref() else {
        return false;
    };

    tracing_init::init_tracing(tracing_config);
    true
}

async fn run(command: Command, config: Config) -> Result<()> {
    match command {
        Command::Move { event_file } => run_move(config, event_file.as_deref()).await,
        Command::Inventory { event_file } => run_inventory(event_file.as_deref()).await,
        Command::Report => run_report(config).await,
    }
}

async fn run_move(config: Config, event_file: Option<&Path>) -> Result<()> {
    let payload = read_payload(event_file).await?;

    let storage = create_storage(&config).await;
    let dispatcher = BatchDispatcher::new(config, storage);

    let result = dispatcher.handle_event(&payload).await;
    println!("{}", serde_json::to_string(&result)?);

    if result.status_code != 200 {
        return Err(anyhow!(S3IngestError::TopLevel(format!(
            "batch invocation returned status {}",
            result.status_code
        ))));
    }

    let failed = result.failed_count() as u64;
    partial_failure(result.outcomes().len() as u64 - failed, failed)
}

async fn run_inventory(event_file: Option<&Path>) -> Result<()> {
    let payload = read_payload(event_file).await?;
    let messages = BatchDispatcher::parse_batch(&payload)?;

    let mut succeeded = 0;
    let mut failed = 0;
    for result in BatchDispatcher::inventory_batch(&messages) {
        match result {
            Ok(records) => {
                succeeded += 1;
                for record in records {
                    println!("{}", serde_json::to_string(&record)?);
                }
            }
            Err(e) => {
                failed += 1;
                warn!(error = %e, "inventory skipped a message.");
            }
        }
    }

    partial_failure(succeeded, failed)
}

async fn run_report(config: Config) -> Result<()> {
    let tag_query = create_tag_query(&config).await;
    let storage = create_storage(&config).await;

    let generator = TagReportGenerator::new(config.report_config.clone(), tag_query, storage);
    let uri = generator.generate().await?;

    println!("{uri}");
    Ok(())
}

/// Read the trigger payload from `event_file`, or from stdin when absent.
async fn read_payload(event_file: Option<&Path>) -> Result<String> {
    match event_file {
        Some(path) => {
            debug!(path = %path.display(), "reading trigger payload from file.");
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| S3IngestError::Io(format!("cannot read {}", path.display())))
        }
        None => {
            debug!("reading trigger payload from stdin.");
            let mut payload = String::new();
            tokio::io::stdin()
                .read_to_string(&mut payload)
                .await
                .with_context(|| S3IngestError::Io("cannot read stdin".to_string()))?;
            Ok(payload)
        }
    }
}

fn partial_failure(succeeded: u64, failed: u64) -> Result<()> {
    if failed == 0 {
        return Ok(());
    }

    warn!(
        succeeded = succeeded,
        failed = failed,
        "some messages were not processed."
    );
    Err(anyhow!(S3IngestError::PartialFailure { succeeded, failed }))
}
