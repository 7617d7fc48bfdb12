//! # Overlap Scan CLI (`ovscan`)
//!
//! The `ovscan` binary is the primary interface for Overlap Scan. It runs
//! the HTTP server for the web front end and offers offline commands for
//! inspecting the document tree and running the overlap comparison over
//! already-parsed sidecars.
//!
//! ## Usage
//!
//! ```bash
//! ovscan --config ./config/ovscan.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ovscan serve` | Start the HTTP server (upload, scan, compare) |
//! | `ovscan collect` | List discovered documents and their sidecar state |
//! | `ovscan compare` | Print the overlap report for parsed documents |
//! | `ovscan status` | List every job known to the remote parsing service |

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use overlap_scan::config::load_config;
use overlap_scan::parser_client::{KbClient, ParseClient};
use overlap_scan::scan::ScanOrchestrator;
use overlap_scan::{collect, compare, server};

/// Overlap Scan — exact duplicate-passage detection across externally
/// parsed document collections.
#[derive(Parser)]
#[command(
    name = "ovscan",
    about = "Overlap Scan — exact duplicate-passage detection across document collections",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/ovscan.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    ///
    /// Collects the document tree on startup; the scan worker is started
    /// on demand through `POST /backend/scan`.
    Serve,

    /// List discovered documents and whether each has a parsed sidecar.
    Collect,

    /// Run the overlap comparison over existing sidecars and print the
    /// report as pretty JSON. Purely local; the parsing service is not
    /// contacted.
    Compare,

    /// List the status of every job known to the remote parsing service.
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            let client = Arc::new(KbClient::new(&config.parser)?);
            let orchestrator = Arc::new(ScanOrchestrator::new(config.clone(), client));
            if let Err(err) = orchestrator.collect() {
                eprintln!("Warning: initial collection failed: {err}");
            }
            server::run_server(&config, orchestrator).await?;
        }
        Commands::Collect => {
            let entries = collect::collect_documents(&config)?;
            for entry in &entries {
                let state = if entry.sidecar.exists() {
                    "parsed"
                } else {
                    "pending"
                };
                println!("{}  [{}]", entry.path.display(), state);
            }
            println!("{} document(s)", entries.len());
        }
        Commands::Compare => {
            compare::run_compare_cli(&config)?;
        }
        Commands::Status => {
            let client = KbClient::new(&config.parser)?;
            let statuses = client.list_all().await?;
            if statuses.is_empty() {
                println!("no jobs known to the parsing service");
            }
            for status in statuses {
                println!("{}  {}  {}", status.result_path, status.status, status.message);
            }
        }
    }

    Ok(())
}
