mod checkpoint;
mod commands;
mod logging;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "couchstream",
    version,
    about = "Stream CouchDB changes to JSON lines and bulk-load JSON lines into CouchDB"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Follow a database's changes feed, writing records to stdout
    Source {
        /// Path to config YAML file
        config: PathBuf,
        /// Stop after emitting at least this many records
        #[arg(long)]
        max_records: Option<u64>,
    },
    /// Read records from stdin and bulk-write them to a database
    Sink {
        /// Path to config YAML file
        config: PathBuf,
        /// Flush the pending batch at this interval, in milliseconds
        #[arg(long)]
        flush_interval_ms: Option<u64>,
    },
    /// Validate configuration, offset storage and store connectivity
    Check {
        /// Path to config YAML file
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init(&cli.log_level);

    match cli.command {
        Commands::Source {
            config,
            max_records,
        } => commands::source::execute(&config, max_records).await,
        Commands::Sink {
            config,
            flush_interval_ms,
        } => commands::sink::execute(&config, flush_interval_ms).await,
        Commands::Check { config } => commands::check::execute(&config).await,
    }
}
