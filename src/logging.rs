//! Diagnostic logging setup
//!
//! Tracing output goes to stderr so it never mixes with generated
//! candidates or match verdicts on stdout. `RUST_LOG` overrides the level
//! chosen from the command line.

use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Map `--verbose` / `--debug` to a level for this crate
pub fn level_from_flags(verbose: bool, debug: bool) -> tracing::Level {
    if debug {
        tracing::Level::DEBUG
    } else if verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    }
}

pub fn init(level: tracing::Level) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new("warn").add_directive(format!("url_forge={}", level).parse()?),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_target(false),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}
