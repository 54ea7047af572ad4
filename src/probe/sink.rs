//! Append-only YAML result log

use crate::error::{Result, UrlForgeError};
use crate::types::{LogEntry, LogRecord};
use parking_lot::Mutex;
use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

/// Crash-safe log keyed by candidate index.
///
/// Every append is a complete `index: [entry]` mapping fragment, so the file
/// parses as one YAML mapping after any number of appends. Writes are
/// serialised behind one async lock and synced before `append` returns.
#[derive(Debug)]
pub struct ResultSink {
    path: PathBuf,
    file: tokio::sync::Mutex<File>,
    written: Mutex<HashSet<u64>>,
    failed: AtomicBool,
}

impl ResultSink {
    /// Open `path` for appending, creating it and its parent directories.
    ///
    /// Indices already present in an existing log are registered, so a
    /// later run appending to the same file can never record them twice.
    /// An existing log that does not parse is refused.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                UrlForgeError::io(e.to_string(), Some(parent.display().to_string()))
            })?;
        }

        let existing = match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {
                let content = tokio::fs::read_to_string(&path)
                    .await
                    .map_err(|e| UrlForgeError::io(e.to_string(), Some(path.display().to_string())))?;
                parse_log(&content).map_err(|e| {
                    UrlForgeError::io(
                        format!("existing log cannot be extended: {}", e),
                        Some(path.display().to_string()),
                    )
                })?
            }
            // Devices and pipes carry no earlier records
            Ok(_) => BTreeMap::new(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(UrlForgeError::io(e.to_string(), Some(path.display().to_string()))),
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| UrlForgeError::io(e.to_string(), Some(path.display().to_string())))?;

        tracing::debug!(path = %path.display(), existing = existing.len(), "Opened result log");

        Ok(Self {
            path,
            file: tokio::sync::Mutex::new(file),
            written: Mutex::new(existing.into_keys().collect()),
            failed: AtomicBool::new(false),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// First index not yet present in the log
    pub fn next_index(&self) -> u64 {
        self.written.lock().iter().max().map_or(1, |highest| highest + 1)
    }

    /// Whether a write has failed; the sink refuses further records once set
    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    /// Append one record, returning once it is on disk
    pub async fn append(&self, record: &LogRecord) -> Result<()> {
        if self.has_failed() {
            return Err(self.write_error("log is unusable after an earlier write failure"));
        }
        if !self.written.lock().insert(record.index) {
            return Err(UrlForgeError::unexpected(format!(
                "index {} was already recorded",
                record.index
            )));
        }

        let fragment = serialize_record(record)?;

        let mut file = self.file.lock().await;
        let written = async {
            file.write_all(fragment.as_bytes()).await?;
            file.flush().await?;
            file.sync_data().await
        }
        .await;

        written.map_err(|e| {
            self.failed.store(true, Ordering::Release);
            tracing::error!(path = %self.path.display(), index = record.index, error = %e, "Log write failed");
            self.write_error(e.to_string())
        })
    }

    fn write_error(&self, message: impl Into<String>) -> UrlForgeError {
        UrlForgeError::sink_write(message, Some(self.path.display().to_string()))
    }
}

fn serialize_record(record: &LogRecord) -> Result<String> {
    let mut fragment = BTreeMap::new();
    fragment.insert(record.index, vec![record.entry()]);
    let yaml = serde_yaml::to_string(&fragment)?;
    let body = yaml.strip_prefix("---\n").unwrap_or(&yaml);
    Ok(body.to_string())
}

/// Read a result log back, ordered by index
pub fn read_log(path: impl AsRef<Path>) -> Result<BTreeMap<u64, LogEntry>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .map_err(|e| UrlForgeError::io(e.to_string(), Some(path.display().to_string())))?;
    parse_log(&content)
}

fn parse_log(content: &str) -> Result<BTreeMap<u64, LogEntry>> {
    let body = content.trim_start().strip_prefix("---").unwrap_or(content);
    if body.trim().is_empty() {
        return Ok(BTreeMap::new());
    }

    let raw: RawLog = serde_yaml::from_str(body)?;
    Ok(raw.0)
}

/// Index-to-entry mapping that fails on a repeated index instead of
/// keeping only the last occurrence
struct RawLog(BTreeMap<u64, LogEntry>);

impl<'de> Deserialize<'de> for RawLog {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct RawLogVisitor;

        impl<'de> Visitor<'de> for RawLogVisitor {
            type Value = RawLog;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a mapping of indices to single-record lists")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<RawLog, A::Error> {
                let mut log = BTreeMap::new();
                let mut seen = HashSet::new();
                while let Some((index, entries)) = access.next_entry::<u64, Vec<LogEntry>>()? {
                    if !seen.insert(index) {
                        return Err(de::Error::custom(format!("index {} is recorded more than once", index)));
                    }
                    if let Some(entry) = entries.into_iter().next() {
                        log.insert(index, entry);
                    }
                }
                Ok(RawLog(log))
            }
        }

        deserializer.deserialize_map(RawLogVisitor)
    }
}
