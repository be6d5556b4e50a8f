//! cacheplan - plan one batch file and print the chosen datasets
//!
//! Usage: cacheplan <batch-file> [--seed N]
//!
//! Logs go to stderr and are filtered by `RUST_LOG` (default `cacheplan=info`).

use cacheplan_cli::{run, CliArgs, CliError};
use tracing_subscriber::EnvFilter;

fn main() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cacheplan=info,warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let result = CliArgs::parse(std::env::args().skip(1)).and_then(|args| run(&args));
    match result {
        Ok(decision) => {
            for dataset in &decision.datasets {
                println!("{}", dataset.name);
            }
        }
        Err(CliError::Usage) => {
            eprintln!("{}", cacheplan_cli::USAGE);
            eprintln!();
            eprintln!("Example:");
            eprintln!("  cacheplan demos/two_tenants.toml --seed 42");
            std::process::exit(1);
        }
        Err(e) => {
            tracing::error!(error = %e, "planning failed");
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    }
}
