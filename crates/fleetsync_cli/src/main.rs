//! fleetsync CLI
//!
//! Pushes a device registry export into the CMDB.
//!
//! # Commands
//!
//! - `plan` - Show what a sync would create and update
//! - `sync` - Apply the plan, recording created records for revert
//! - `revert` - Delete the records a previous run created
//! - `results` - List persisted runs
//! - `version` - Show version information

mod client;
mod commands;

use clap::{Parser, Subcommand};
use commands::Remote;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Fleet-to-CMDB synchronization.
#[derive(Parser)]
#[command(name = "fleetsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding run results and the revert log
    #[arg(
        global = true,
        short,
        long,
        env = "FLEETSYNC_DATA_DIR",
        default_value = "fleetsync-data"
    )]
    data_dir: PathBuf,

    /// CMDB API base URL
    #[arg(global = true, long, env = "FLEETSYNC_BASE_URL")]
    base_url: Option<String>,

    /// CMDB API bearer token
    #[arg(global = true, long, env = "FLEETSYNC_API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show what a sync would create and update
    Plan {
        /// Registry export (JSON)
        #[arg(short, long)]
        source: PathBuf,

        /// Destination snapshot file used instead of querying the CMDB
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Apply the plan to the CMDB
    Sync {
        /// Registry export (JSON)
        #[arg(short, long)]
        source: PathBuf,

        /// Destination snapshot file used instead of querying the CMDB
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Intercept every write
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,

        /// Only create missing records, never update
        #[arg(long)]
        create_only: bool,

        /// Only process these source ids (repeatable)
        #[arg(long = "select", value_name = "ID")]
        select: Vec<String>,
    },

    /// Delete the records a previous run created
    Revert {
        /// Run to revert (defaults to the latest run still in the log)
        #[arg(short, long)]
        run_id: Option<String>,

        /// Show what would be deleted
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// List persisted runs
    Results {
        /// Maximum number of runs to show
        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let remote = Remote::new(cli.base_url, cli.api_token);

    match cli.command {
        Commands::Plan {
            source,
            snapshot,
            format,
        } => {
            commands::plan::run(&remote, &source, snapshot.as_deref(), &format)?;
        }
        Commands::Sync {
            source,
            snapshot,
            dry_run,
            yes,
            create_only,
            select,
        } => {
            let args = commands::sync::SyncArgs {
                source,
                snapshot,
                dry_run,
                yes,
                create_only,
                select,
            };
            commands::sync::run(&cli.data_dir, &remote, &args)?;
        }
        Commands::Revert {
            run_id,
            dry_run,
            yes,
        } => {
            commands::revert::run(&cli.data_dir, &remote, run_id, dry_run, yes)?;
        }
        Commands::Results { limit, format } => {
            commands::results::run(&cli.data_dir, limit, &format)?;
        }
        Commands::Version => {
            println!("fleetsync CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
