//! apifetch - fetch JSON APIs with caching, stale fallback and local fixtures
//!
//! Fetches each URL given on the command line through one `ApiClient` and
//! prints the decoded payloads as pretty JSON.

use std::io::{self, Write};
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use apifetch::cli::{Cli, RunConfig};

/// Sets up logging to stderr, filtered by `RUST_LOG` (default: warn)
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Runs every fetch and prints the results
async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = RunConfig::from_cli(&cli)?;
    let client = config.build_client();

    let results = config.fetch_all(&client).await;

    let mut stdout = io::stdout().lock();
    let mut failed = 0;
    for (url, result) in config.urls.iter().zip(results) {
        match result {
            Ok(response) => {
                serde_json::to_writer_pretty(&mut stdout, response.data())?;
                writeln!(stdout)?;
            }
            Err(e) => {
                failed += 1;
                eprintln!("{}: {}", url, e);
            }
        }
    }

    if failed > 0 {
        return Err(format!("{} of {} requests failed", failed, config.urls.len()).into());
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
