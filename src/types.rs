//! Core types and structures for url-forge

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Candidate ordering mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    /// Exhaustive enumeration in lexicographic order
    Natural,
    /// Independent random samples, duplicates allowed
    #[default]
    Random,
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortMode::Natural => write!(f, "natural"),
            SortMode::Random => write!(f, "random"),
        }
    }
}

/// Repetition limit applied to every quantified atom.
///
/// A repetition range `[min, max]` keeps at most `n` distinct repeat counts.
/// The same value caps the length of an ordered enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Limit(Option<u32>);

impl Limit {
    pub const UNBOUNDED: Limit = Limit(None);

    /// Span given to `*`, `+` and `{n,}` when the limit is unbounded
    pub const UNBOUNDED_REPEAT_SPAN: u32 = 20;

    pub fn new(n: u32) -> Self {
        Self(Some(n))
    }

    pub fn get(&self) -> Option<u32> {
        self.0
    }

    pub fn is_unbounded(&self) -> bool {
        self.0.is_none()
    }

    /// Resolve a quantifier into a finite `(min, max)` repeat range.
    ///
    /// Returns `None` when the limit leaves no repeat count available.
    pub fn bound_repeat(&self, min: u32, max: Option<u32>) -> Option<(u32, u32)> {
        let span = match (self.0, max) {
            (Some(n), _) => n,
            (None, Some(max)) => return Some((min, max)),
            (None, None) => Self::UNBOUNDED_REPEAT_SPAN,
        };

        if span == 0 {
            return if min == 0 { Some((0, 0)) } else { None };
        }

        let widest = min.saturating_add(span - 1);
        let upper = max.map_or(widest, |max| max.min(widest));
        Some((min, upper))
    }

    /// Cap an enumeration length by this limit
    pub fn cap_len(&self, count: u128) -> u128 {
        match self.0 {
            Some(n) => count.min(n as u128),
            None => count,
        }
    }
}

impl From<Option<u32>> for Limit {
    fn from(value: Option<u32>) -> Self {
        Self(value)
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(n) => write!(f, "{}", n),
            None => write!(f, "unbounded"),
        }
    }
}

/// A generated (or supplied) candidate with its emission index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// 1-based, assigned at emission, never reused
    pub index: u64,
    pub value: String,
}

/// Response headers in arrival order.
///
/// Repeated names are merged into one entry joined by `", "`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_header_map(map: &reqwest::header::HeaderMap) -> Self {
        let mut headers = Self::new();
        for (name, value) in map {
            headers.insert(name.as_str(), String::from_utf8_lossy(value.as_bytes()));
        }
        headers
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(&name)) {
            Some((_, existing)) => {
                existing.push_str(", ");
                existing.push_str(&value);
            }
            None => self.0.push((name, value)),
        }
    }

    /// Case-insensitive lookup
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Headers {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Headers {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct HeadersVisitor;

        impl<'de> Visitor<'de> for HeadersVisitor {
            type Value = Headers;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a mapping of header names to values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Headers, A::Error> {
                let mut headers = Headers::new();
                while let Some((name, value)) = access.next_entry::<String, String>()? {
                    headers.insert(name, value);
                }
                Ok(headers)
            }
        }

        deserializer.deserialize_map(HeadersVisitor)
    }
}

/// Outcome of probing one candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Success { status_code: u16, headers: Headers },
    NetworkFailure { message: String },
    UnexpectedFailure { message: String },
}

impl ValidationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Success { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::NetworkFailure { .. } => "network_failure",
            Self::UnexpectedFailure { .. } => "unexpected_failure",
        }
    }
}

/// Durable outcome record for one candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub index: u64,
    pub url: String,
    pub outcome: ValidationOutcome,
}

impl LogRecord {
    pub fn new(index: u64, url: impl Into<String>, outcome: ValidationOutcome) -> Self {
        Self {
            index,
            url: url.into(),
            outcome,
        }
    }

    /// Canonical serialized form
    pub fn entry(&self) -> LogEntry {
        match &self.outcome {
            ValidationOutcome::Success { status_code, headers } => LogEntry::Success {
                status_code: *status_code,
                headers: headers.clone(),
                url: self.url.clone(),
            },
            ValidationOutcome::NetworkFailure { message }
            | ValidationOutcome::UnexpectedFailure { message } => LogEntry::Failure {
                error: message.clone(),
                url: self.url.clone(),
            },
        }
    }

    /// One-line status for progress output, e.g. `[404] Not Found: https://...`
    pub fn status_line(&self) -> String {
        match &self.outcome {
            ValidationOutcome::Success { status_code, .. } => {
                let reason = reqwest::StatusCode::from_u16(*status_code)
                    .ok()
                    .and_then(|s| s.canonical_reason())
                    .unwrap_or("Unknown Status");
                format!("[{}] {}: {}", status_code, reason, self.url)
            }
            ValidationOutcome::NetworkFailure { message }
            | ValidationOutcome::UnexpectedFailure { message } => message.clone(),
        }
    }
}

/// One entry of the YAML log, as written to and read from disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LogEntry {
    Success {
        status_code: u16,
        headers: Headers,
        url: String,
    },
    Failure {
        error: String,
        url: String,
    },
}

impl LogEntry {
    pub fn url(&self) -> &str {
        match self {
            Self::Success { url, .. } | Self::Failure { url, .. } => url,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Success { status_code, .. } => Some(*status_code),
            Self::Failure { .. } => None,
        }
    }
}

/// Configuration for candidate generation
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub pattern: String,
    pub limit: Limit,
    pub sort: SortMode,
    /// Number of samples in random mode
    pub count: u64,
    /// Pause between successive emissions
    pub interval: Duration,
    /// Seed for reproducible random runs
    pub seed: Option<u64>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            pattern: r"https://www\.example\.com/\d{7}".to_string(),
            limit: Limit::UNBOUNDED,
            sort: SortMode::Random,
            count: 10,
            interval: Duration::from_secs(1),
            seed: None,
        }
    }
}

/// Configuration for candidate checking
#[derive(Debug, Clone)]
pub struct CheckConfig {
    /// Maximum number of probes in flight
    pub concurrency: usize,
    pub timeout: Duration,
    /// Pause between successive URLs of a list-driven check
    pub interval: Duration,
    /// Retrieve and archive bodies of 200 responses
    pub download: bool,
    pub user_agent: String,
    pub log_path: PathBuf,
    pub archive_root: PathBuf,
}

impl Default for CheckConfig {
    fn default() -> Self {
        let stamp = chrono::Local::now().format("%Y%m%d%H%M%S").to_string();
        Self {
            concurrency: 50,
            timeout: Duration::from_secs(5),
            interval: Duration::from_secs(1),
            download: false,
            user_agent: format!("url-forge/{}", env!("CARGO_PKG_VERSION")),
            log_path: PathBuf::from("log").join(format!("{}.yaml", stamp)),
            archive_root: PathBuf::from("contents").join(stamp),
        }
    }
}

/// Live counters for a run
#[derive(Debug, Default)]
pub struct RunMetrics {
    dispatched: AtomicU64,
    completed: AtomicU64,
    succeeded: AtomicU64,
    network_failures: AtomicU64,
    unexpected_failures: AtomicU64,
    archived: AtomicU64,
    archive_failures: AtomicU64,
    generation_failures: AtomicU64,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one finished candidate under its outcome
    pub fn record_completed(&self, outcome: &ValidationOutcome) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        let counter = match outcome {
            ValidationOutcome::Success { .. } => &self.succeeded,
            ValidationOutcome::NetworkFailure { .. } => &self.network_failures,
            ValidationOutcome::UnexpectedFailure { .. } => &self.unexpected_failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_archived(&self) {
        self.archived.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_archive_failures(&self) {
        self.archive_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_generation_failures(&self) {
        self.generation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            network_failures: self.network_failures.load(Ordering::Relaxed),
            unexpected_failures: self.unexpected_failures.load(Ordering::Relaxed),
            archived: self.archived.load(Ordering::Relaxed),
            archive_failures: self.archive_failures.load(Ordering::Relaxed),
            generation_failures: self.generation_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`RunMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub dispatched: u64,
    pub completed: u64,
    pub succeeded: u64,
    pub network_failures: u64,
    pub unexpected_failures: u64,
    pub archived: u64,
    pub archive_failures: u64,
    pub generation_failures: u64,
}

impl MetricsSnapshot {
    pub fn failures(&self) -> u64 {
        self.network_failures + self.unexpected_failures
    }
}

/// Final report of a check run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub metrics: MetricsSnapshot,
    pub interrupted: bool,
    pub elapsed: Duration,
    pub log_path: PathBuf,
    pub archive_root: Option<PathBuf>,
}
