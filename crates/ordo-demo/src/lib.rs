#![forbid(unsafe_code)]

//! `ordo-demo`: a command-line walkthrough of one drag-and-drop reorder.
//!
//! Seeds an in-memory backend with a board or a set of greenhouse zones,
//! drops one item, waits for the remote writes to settle, and prints the
//! container states before the drop, right after it, and after syncing.

pub mod cli;
pub mod domains;
pub mod error;
pub mod walkthrough;

pub use cli::{run, run_from_env};

use cli::LogFormat;

const DEFAULT_FILTER: &str = "warn,ordo=info";

/// Installs a stderr subscriber; `RUST_LOG` overrides the default filter.
pub fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(DEFAULT_FILTER))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    let _ = match format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
