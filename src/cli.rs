use clap::{ArgAction, Args, Parser, Subcommand};
use std::num::NonZeroUsize;

/// Database dump/restore tool that runs one background job per database
#[derive(Parser, Debug)]
#[command(name = "dbdump")]
#[command(disable_version_flag = true)]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    /// Print the version number and exit
    #[arg(short = 'v')]
    pub version: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Dump one or more databases
    #[command(disable_help_flag = true)]
    Dump(DumpArgs),
    /// Restore a database from a dump file
    #[command(disable_help_flag = true)]
    Restore(RestoreArgs),
}

/// Flags shared by both commands to reach the database server.
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// Database host
    #[arg(short = 'h', default_value = "127.0.0.1")]
    pub host: String,

    /// Database port
    #[arg(short = 'p', default_value_t = 5432)]
    pub port: u16,

    /// Database user
    #[arg(short = 'U', default_value = "postgres")]
    pub user: String,

    /// Database password
    #[arg(short = 'W')]
    pub password: String,

    /// The type of database (e.g. postgres)
    #[arg(short = 't', default_value = "postgres")]
    pub engine: String,
}

#[derive(Args, Debug, Clone)]
pub struct DumpArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Back up all non-system databases
    #[arg(short = 'a', conflicts_with = "databases")]
    pub all: bool,

    /// Database to back up (can be used multiple times)
    #[arg(short = 'd', action = ArgAction::Append)]
    pub databases: Vec<String>,

    /// Target environment tag used in file names (e.g. prod, staging)
    #[arg(short = 'e', default_value = "staging")]
    pub env_tag: String,

    /// Keep the dump on local disk and skip the upload
    #[arg(short = 'l')]
    pub local: bool,

    /// Cap on pipelines running at the same time (default: one per database)
    #[arg(long)]
    pub max_parallel: Option<NonZeroUsize>,

    #[arg(long, action = ArgAction::Help)]
    pub help: Option<bool>,
}

#[derive(Args, Debug, Clone)]
pub struct RestoreArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Name of the database to restore
    #[arg(short = 'd')]
    pub database: String,

    /// Local path of the dump file, or its remote URI when downloading
    #[arg(short = 'f')]
    pub source: String,

    /// Number of parallel restore processes
    #[arg(short = 'n', default_value_t = 2, value_parser = clap::value_parser!(u32).range(1..))]
    pub jobs: u32,

    /// Download the dump from remote storage before restoring
    #[arg(
        short = 's',
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value_t = true,
        default_missing_value = "true"
    )]
    pub remote: bool,

    #[arg(long, action = ArgAction::Help)]
    pub help: Option<bool>,
}

pub fn print_usage() {
    println!("Usage: dbdump <command> [arguments]");
    println!("\nAvailable commands:");
    println!("  dump       Dump one or more databases");
    println!("  restore    Restore a database from a dump file");
    println!("  -v         Print the version number and exit");
    println!("\nUse `dbdump <command> --help` for more information about specific command.");
}
