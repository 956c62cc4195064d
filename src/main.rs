//! Database Dump/Restore Tool
//!
//! Runs one background job per database and records each job's progress in
//! its own log file.

// dbdump/src/main.rs
mod backup;
mod cli;
mod config;
mod engine;
mod errors;
mod orchestrator;
mod restore;
mod storage;
mod utils;

use anyhow::{Context, Result};
use clap::Parser;
use clap::error::ErrorKind;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, DumpArgs, RestoreArgs, print_usage};
use config::{DumpConfig, RestoreConfig};
use engine::{DatabaseEngine, Engine, Operation};

const APP_NAME: &str = "dbdump";

/// Main entry point for the dump/restore tool
#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    init_tracing();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if e.kind() == ErrorKind::DisplayHelp => {
            print!("{}", e);
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            println!("{}", e);
            print_usage();
            return ExitCode::FAILURE;
        }
    };

    if cli.version {
        println!("{} version {}", APP_NAME, env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    let result = match cli.command {
        Some(Commands::Dump(args)) => execute_dump_command(&args).await,
        Some(Commands::Restore(args)) => execute_restore_command(&args).await,
        None => {
            print_usage();
            return ExitCode::FAILURE;
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

async fn execute_dump_command(args: &DumpArgs) -> Result<()> {
    let config = DumpConfig::from_args(args).context("Invalid dump arguments")?;

    let engine: Arc<dyn DatabaseEngine> = Arc::new(
        Engine::connect(&config.connection, Operation::Dump)
            .context("Failed to initialize database engine")?,
    );

    let store = storage::for_dump(config.local_only, env_lookup)
        .await
        .context("Error initializing remote storage uploader")?;

    backup::run_backup_flow(&config, engine, store)
        .await
        .context("Could not resolve the databases to back up")?;

    println!("Check the 'backup_log_*.log' files for progress and results.");
    Ok(())
}

async fn execute_restore_command(args: &RestoreArgs) -> Result<()> {
    let config = RestoreConfig::from_args(args).context("Invalid restore arguments")?;

    let engine: Arc<dyn DatabaseEngine> = Arc::new(
        Engine::connect(&config.connection, Operation::Restore { jobs: config.jobs })
            .context("Failed to initialize database engine")?,
    );

    let store = storage::for_restore(&config.source, env_lookup)
        .await
        .context("Error initializing remote storage downloader")?;

    restore::run_restore_flow(&config, engine, store).await;

    println!("Check the 'restore_log_*.log' file for progress and results.");
    Ok(())
}
