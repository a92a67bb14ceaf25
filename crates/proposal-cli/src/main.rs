//! # proposal CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use proposal_cli::digest::{
    run_canonical, run_hash, run_verify, CanonicalArgs, HashArgs, VerifyArgs,
};

/// Offline tooling for proposal documents.
///
/// Computes and checks the same canonical SHA-256 fingerprint the API
/// stores when a document is signed.
#[derive(Parser, Debug)]
#[command(name = "proposal", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the canonical SHA-256 of a content file.
    Hash(HashArgs),

    /// Check a content file against an expected hash.
    Verify(VerifyArgs),

    /// Print the canonical bytes of a content file.
    Canonical(CanonicalArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity level.
    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut stdout = std::io::stdout().lock();
    let result = match &cli.command {
        Commands::Hash(args) => run_hash(args, &mut stdout),
        Commands::Verify(args) => run_verify(args, &mut stdout),
        Commands::Canonical(args) => run_canonical(args, &mut stdout),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}
