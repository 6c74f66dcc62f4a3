//! Utilities: logging setup (verbosity flags -> tracing filter, stderr only).
//!
//! Key items:
//!   init_logging / derive_level

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Map `-v` / `-q` to a level. Quiet wins.
pub fn derive_level(verbose: u8, quiet: bool) -> Level {
    if quiet {
        return Level::ERROR;
    }
    match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Filter for this crate at `level`; `RUST_LOG` replaces it when set.
pub fn filter_for(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,{}={}",
            env!("CARGO_CRATE_NAME"),
            level.as_str().to_ascii_lowercase()
        ))
    })
}

/// Install the global subscriber. Logs go to stderr: stdout carries MCP frames.
pub fn init_logging(level: Level) {
    // a second init (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .with_env_filter(filter_for(level))
        .try_init();
}
