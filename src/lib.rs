//! url-forge - pattern-driven URL generation and validation
//!
//! Instantiates a small regular-expression dialect into candidate strings,
//! exhaustively or at random, and probes each candidate over HTTP behind a
//! bounded worker pool, recording every outcome in an append-only YAML log.

pub mod cli;
pub mod error;
pub mod logging;
pub mod pattern;
pub mod probe;
pub mod report;
pub mod run;
pub mod source;
pub mod types;

// Re-export commonly used types
pub use error::{Result, UrlForgeError};
pub use types::{
    Candidate, CheckConfig, GenerationConfig, Headers, Limit, LogEntry, LogRecord,
    MetricsSnapshot, RunMetrics, RunSummary, SortMode, ValidationOutcome,
};

// Re-export main functionality
pub use pattern::{Matcher, Pattern};
pub use probe::{read_log, ContentArchiver, DirectoryArchiver, ResultSink, Validator};
pub use report::{NullReporter, ProgressReporter, Reporter};
pub use run::RunContext;
pub use source::CandidateSource;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the library
pub fn init() -> Result<()> {
    // Load .env file if it exists
    dotenv::dotenv().ok();
    Ok(())
}
