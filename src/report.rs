//! Progress reporting

use crate::types::{LogRecord, RunSummary};
use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::Mutex;

/// Receives run progress; injected into the validator at construction
pub trait Reporter: Send + Sync {
    /// A run is starting; `total` is known for finite sources
    fn started(&self, total: Option<u64>);

    /// A record was written to the log
    fn completed(&self, record: &LogRecord);

    fn finished(&self, summary: &RunSummary);

    /// Free-form message that must not tear the progress display
    fn note(&self, message: &str);
}

/// Silent reporter for tests and library use
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn started(&self, _total: Option<u64>) {}
    fn completed(&self, _record: &LogRecord) {}
    fn finished(&self, _summary: &RunSummary) {}
    fn note(&self, _message: &str) {}
}

/// Terminal progress bar showing the latest status line
#[derive(Default)]
pub struct ProgressReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self::default()
    }

    fn bar_for(total: Option<u64>) -> ProgressBar {
        match total {
            Some(len) => {
                let bar = ProgressBar::new(len);
                bar.set_style(
                    ProgressStyle::with_template(
                        "{spinner:.green} [{elapsed_precise}] [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}",
                    )
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
                );
                bar
            }
            None => {
                let bar = ProgressBar::new_spinner();
                bar.set_style(
                    ProgressStyle::with_template("{spinner:.blue} [{elapsed_precise}] {pos} checked {wide_msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                bar
            }
        }
    }
}

impl Reporter for ProgressReporter {
    fn started(&self, total: Option<u64>) {
        *self.bar.lock() = Some(Self::bar_for(total));
    }

    fn completed(&self, record: &LogRecord) {
        if let Some(bar) = self.bar.lock().as_ref() {
            let line = record.status_line();
            if record.outcome.status_code() == Some(200) {
                bar.println(&line);
            }
            bar.set_message(line);
            bar.inc(1);
        }
    }

    fn finished(&self, summary: &RunSummary) {
        if let Some(bar) = self.bar.lock().take() {
            bar.finish_with_message(if summary.interrupted { "interrupted" } else { "done" });
        }
    }

    fn note(&self, message: &str) {
        match self.bar.lock().as_ref() {
            Some(bar) => bar.println(message),
            None => eprintln!("{}", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Headers, MetricsSnapshot, ValidationOutcome};
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn test_progress_reporter_lifecycle() {
        let reporter = ProgressReporter::new();
        reporter.note("before start");
        reporter.started(Some(2));
        reporter.completed(&LogRecord::new(
            1,
            "https://x.io/a",
            ValidationOutcome::Success {
                status_code: 200,
                headers: Headers::new(),
            },
        ));
        reporter.completed(&LogRecord::new(
            2,
            "https://x.io/b",
            ValidationOutcome::NetworkFailure {
                message: "Error while checking https://x.io/b: refused".into(),
            },
        ));
        assert_eq!(reporter.bar.lock().as_ref().map(|b| b.position()), Some(2));

        reporter.finished(&RunSummary {
            metrics: MetricsSnapshot::default(),
            interrupted: false,
            elapsed: Duration::from_millis(5),
            log_path: PathBuf::from("log/run.yaml"),
            archive_root: None,
        });
        assert!(reporter.bar.lock().is_none());
    }
}
