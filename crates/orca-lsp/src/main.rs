//! Orca Language Server.
//!
//! Usage:
//!   orca-lsp              # Start LSP server (stdio)
//!   orca-lsp --version    # Print version
//!   orca-lsp --help       # Print help

use std::process::ExitCode;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, EnvFilter};

/// Filter used when `RUST_LOG` is unset or invalid.
const DEFAULT_FILTER: &str = "orca_lsp=info";

fn main() -> ExitCode {
    // Parse simple args (no clap needed for LSP server)
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("orca-lsp {}", orca_lsp::VERSION);
        return ExitCode::SUCCESS;
    }

    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("Orca Language Server");
        println!();
        println!("Usage: orca-lsp [OPTIONS]");
        println!();
        println!("Options:");
        println!("  -h, --help     Print help");
        println!("  -V, --version  Print version");
        println!();
        println!("The server communicates via stdio using the Language Server Protocol.");
        println!();
        println!("Environment variables:");
        println!("  RUST_LOG            Set log level (e.g., RUST_LOG=orca_lsp=debug)");
        println!(
            "  {}   Default library root",
            orca_lsp::config::LIBRARY_PATH_ENV
        );
        return ExitCode::SUCCESS;
    }

    // Logs go to stderr; stdout carries the protocol.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let (filter, handle) = reload::Layer::new(filter);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    // The client's `logLevel` option replaces the filter.
    let set_log_level = move |level: &str| match EnvFilter::try_new(level) {
        Ok(filter) => match handle.reload(filter) {
            Ok(()) => tracing::info!("Log level set to {}", level),
            Err(e) => tracing::warn!("Failed to set log level: {}", e),
        },
        Err(e) => tracing::warn!("Ignoring invalid log level {:?}: {}", level, e),
    };

    match orca_lsp::start_stdio(Some(Box::new(set_log_level))) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Server error: {}", e);
            ExitCode::FAILURE
        }
    }
}
