use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "sftp-mirror")]
#[command(about = "Mirror a remote SFTP directory and catalog what was fetched", long_about = None)]
pub struct Cli {
    /// Configuration file name (TOML, extension optional)
    #[arg(short, long, global = true, default_value = "Config")]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Perform one mirror pass: list, fetch, catalog, report
    Run {
        /// Number of concurrent fetch workers (overrides transfer.workers)
        #[arg(short, long)]
        workers: Option<usize>,
        /// Exit with status 2 if any file failed to fetch
        #[arg(long)]
        fail_on_error: bool,
    },
    /// Print the catalog of fetched files
    Catalog {
        /// Only show records for this filename
        #[arg(short, long)]
        filename: Option<String>,
    },
    /// Print configuration values (secrets redacted)
    PrintConfig,
}
