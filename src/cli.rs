//! Command line interface
//!
//! Every option can also be supplied through a `URLFORGE_*` environment
//! variable (or a `.env` file).

use crate::types::{CheckConfig, GenerationConfig, Limit, SortMode};
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "url-forge",
    version,
    about = "Generate URLs from a pattern and probe which ones exist"
)]
pub struct Cli {
    /// Verbose diagnostics
    #[arg(short = 'v', long = "verbose", global = true, action = ArgAction::SetTrue, env = "URLFORGE_VERBOSE")]
    pub verbose: bool,

    /// Debug diagnostics (implies verbose)
    #[arg(long = "debug", global = true, action = ArgAction::SetTrue, env = "URLFORGE_DEBUG")]
    pub debug: bool,

    /// Hide the progress bar
    #[arg(long = "no-progress", global = true, action = ArgAction::SetTrue, env = "URLFORGE_NO_PROGRESS")]
    pub no_progress: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Write candidates generated from a pattern, one per line
    Generate(GenerateArgs),
    /// Probe URLs read from files or stdin
    Check(CheckArgs),
    /// Generate candidates and probe them as they are produced
    Scan(ScanArgs),
    /// Report which input lines match a pattern
    Match(MatchArgs),
}

#[derive(Args, Debug, Clone)]
pub struct PatternArgs {
    /// Pattern describing the candidate space
    #[arg(short = 'p', long, env = "URLFORGE_PATTERN", default_value = r"https://www\.example\.com/\d{7}")]
    pub pattern: String,

    /// Repetition limit; unbounded when omitted
    #[arg(short = 'l', long, env = "URLFORGE_LIMIT")]
    pub limit: Option<u32>,

    /// Enumeration order
    #[arg(short = 's', long, value_enum, default_value_t = SortMode::Random, env = "URLFORGE_SORT")]
    pub sort: SortMode,

    /// Number of samples in random mode
    #[arg(short = 'c', long, default_value_t = 10, env = "URLFORGE_COUNT")]
    pub count: u64,

    /// Seed for reproducible random sampling
    #[arg(long, env = "URLFORGE_SEED")]
    pub seed: Option<u64>,
}

impl PatternArgs {
    pub fn generation_config(&self, interval: Duration) -> GenerationConfig {
        GenerationConfig {
            pattern: self.pattern.clone(),
            limit: Limit::from(self.limit),
            sort: self.sort,
            count: self.count,
            interval,
            seed: self.seed,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ProbeArgs {
    /// Result log path [default: log/<timestamp>.yaml]
    #[arg(short = 'o', long = "output", env = "URLFORGE_LOG")]
    pub log: Option<PathBuf>,

    /// Per-request timeout in seconds
    #[arg(short = 't', long, default_value = "5", value_parser = parse_seconds, env = "URLFORGE_TIMEOUT")]
    pub timeout: Duration,

    /// Maximum number of requests in flight
    #[arg(short = 'j', long, default_value_t = 50, env = "URLFORGE_CONCURRENCY")]
    pub concurrency: usize,

    /// Download and archive bodies of 200 responses
    #[arg(short = 'd', long, action = ArgAction::SetTrue, env = "URLFORGE_DOWNLOAD")]
    pub download: bool,

    /// Archive root [default: contents/<timestamp>]
    #[arg(long, env = "URLFORGE_ARCHIVE_DIR")]
    pub archive_dir: Option<PathBuf>,

    /// User-Agent header sent with every request
    #[arg(long, env = "URLFORGE_USER_AGENT")]
    pub user_agent: Option<String>,
}

impl ProbeArgs {
    pub fn check_config(&self, interval: Duration) -> CheckConfig {
        let mut config = CheckConfig {
            concurrency: self.concurrency,
            timeout: self.timeout,
            interval,
            download: self.download,
            ..Default::default()
        };
        if let Some(log) = &self.log {
            config.log_path = log.clone();
        }
        if let Some(dir) = &self.archive_dir {
            config.archive_root = dir.clone();
        }
        if let Some(user_agent) = &self.user_agent {
            config.user_agent = user_agent.clone();
        }
        config
    }
}

#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub pattern: PatternArgs,

    /// Pause between random samples, in seconds
    #[arg(short = 'I', long, default_value = "1", value_parser = parse_seconds, env = "URLFORGE_INTERVAL")]
    pub interval: Duration,

    /// Write candidates here instead of stdout
    #[arg(short = 'o', long = "output", env = "URLFORGE_OUTPUT")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    /// Files with one URL per line; stdin when omitted or `-`
    pub inputs: Vec<PathBuf>,

    #[command(flatten)]
    pub probe: ProbeArgs,

    /// Pause between successive requests, in seconds
    #[arg(short = 'I', long, default_value = "1", value_parser = parse_seconds, env = "URLFORGE_INTERVAL")]
    pub interval: Duration,
}

#[derive(Args, Debug, Clone)]
pub struct ScanArgs {
    #[command(flatten)]
    pub pattern: PatternArgs,

    #[command(flatten)]
    pub probe: ProbeArgs,

    /// Pause between successive candidates, in seconds
    #[arg(short = 'I', long, default_value = "1", value_parser = parse_seconds, env = "URLFORGE_INTERVAL")]
    pub interval: Duration,
}

#[derive(Args, Debug, Clone)]
pub struct MatchArgs {
    /// Regular expression each line is matched against
    #[arg(short = 'p', long, env = "URLFORGE_PATTERN")]
    pub pattern: String,

    /// Files to read; stdin when omitted or `-`
    pub inputs: Vec<PathBuf>,

    /// Emit one JSON object per line
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,
}

/// Parse a non-negative number of seconds, fractions allowed
fn parse_seconds(value: &str) -> Result<Duration, String> {
    let seconds: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a number of seconds", value))?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(format!("'{}' must be a non-negative number of seconds", value));
    }
    Ok(Duration::from_secs_f64(seconds))
}
