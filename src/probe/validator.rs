//! Concurrent HTTP validation of candidates

use super::{ContentArchiver, ResultSink};
use crate::config_error;
use crate::error::{Result, UrlForgeError};
use crate::report::Reporter;
use crate::source::CandidateSource;
use crate::types::{
    Candidate, CheckConfig, Headers, LogRecord, RunMetrics, RunSummary, ValidationOutcome,
};
use futures::{FutureExt, StreamExt};
use reqwest::{Client, StatusCode};
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;

/// Probes candidates behind a bounded worker pool and records every outcome
#[derive(Clone)]
pub struct Validator {
    client: Client,
    timeout: Duration,
    semaphore: Arc<Semaphore>,
    sink: Arc<ResultSink>,
    archiver: Option<Arc<dyn ContentArchiver>>,
    reporter: Arc<dyn Reporter>,
    metrics: Arc<RunMetrics>,
}

impl Validator {
    pub fn new(config: &CheckConfig, sink: Arc<ResultSink>, reporter: Arc<dyn Reporter>) -> Result<Self> {
        if config.concurrency == 0 {
            return Err(config_error!("concurrency must be at least 1"));
        }

        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .connect_timeout(config.timeout)
            .pool_max_idle_per_host(config.concurrency)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| config_error!("Failed to create HTTP client: {}", e))?;

        Ok(Self {
            client,
            timeout: config.timeout,
            semaphore: Arc::new(Semaphore::new(config.concurrency)),
            sink,
            archiver: None,
            reporter,
            metrics: Arc::new(RunMetrics::new()),
        })
    }

    /// Archive bodies of 200 responses through `archiver`
    pub fn with_archiver(mut self, archiver: Arc<dyn ContentArchiver>) -> Self {
        self.archiver = Some(archiver);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<RunMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> Arc<RunMetrics> {
        Arc::clone(&self.metrics)
    }

    /// HEAD `url` once and classify the result
    pub async fn probe(&self, url: &str) -> ValidationOutcome {
        match self.client.head(url).timeout(self.timeout).send().await {
            Ok(response) => ValidationOutcome::Success {
                status_code: response.status().as_u16(),
                headers: Headers::from_header_map(response.headers()),
            },
            Err(e) => classify_failure(url, e.into()),
        }
    }

    /// Probe with panics turned into unexpected failures
    async fn guarded_probe(&self, url: &str) -> ValidationOutcome {
        AssertUnwindSafe(self.probe(url))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| ValidationOutcome::UnexpectedFailure {
                message: unknown_failure(url, panic_message(panic.as_ref())),
            })
    }

    /// Check a single candidate outside of a run
    pub async fn check_one(&self, candidate: Candidate) -> Result<LogRecord> {
        self.process(candidate, None).await
    }

    async fn process(&self, candidate: Candidate, abort: Option<watch::Receiver<bool>>) -> Result<LogRecord> {
        let Candidate { index, value: url } = candidate;

        let outcome = tokio::select! {
            outcome = self.guarded_probe(&url) => outcome,
            _ = wait_for_abort(abort.clone()) => interrupted(&url),
        };

        let record = LogRecord::new(index, url, outcome);
        self.commit(&record).await?;

        if let (Some(archiver), Some(200)) = (&self.archiver, record.outcome.status_code()) {
            tokio::select! {
                result = self.fetch_and_archive(archiver.as_ref(), &record.url) => {
                    self.note_archive(&record.url, result);
                }
                _ = wait_for_abort(abort) => {
                    tracing::debug!(url = %record.url, "Archiving skipped after interrupt");
                }
            }
        }

        self.reporter.completed(&record);
        Ok(record)
    }

    async fn commit(&self, record: &LogRecord) -> Result<()> {
        self.sink.append(record).await?;
        self.metrics.record_completed(&record.outcome);
        tracing::debug!(
            index = record.index,
            url = %record.url,
            outcome = record.outcome.kind(),
            status = ?record.outcome.status_code(),
            "Candidate checked"
        );
        Ok(())
    }

    /// Log a candidate that was pulled from the source but never dispatched
    async fn record_interrupted(&self, candidate: Candidate) -> Result<()> {
        self.metrics.increment_dispatched();
        let outcome = interrupted(&candidate.value);
        let record = LogRecord::new(candidate.index, candidate.value, outcome);
        self.commit(&record).await?;
        self.reporter.completed(&record);
        Ok(())
    }

    async fn fetch_and_archive(&self, archiver: &dyn ContentArchiver, url: &str) -> Result<PathBuf> {
        let response = self.client.get(url).timeout(self.timeout).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(UrlForgeError::archive(format!("GET returned {}", status), url));
        }
        let body = response.bytes().await?;
        archiver.archive(url, &body).await
    }

    fn note_archive(&self, url: &str, result: Result<PathBuf>) {
        match result {
            Ok(path) => {
                self.metrics.increment_archived();
                tracing::info!(url = %url, path = %path.display(), "Content archived");
            }
            Err(e) => {
                self.metrics.increment_archive_failures();
                tracing::warn!(url = %url, error = %e, "Content archiving failed");
            }
        }
    }

    /// Drive `source` through the worker pool until it is exhausted, the
    /// sink fails, or `shutdown` resolves.
    ///
    /// On shutdown no further candidate is emitted, in-flight probes are
    /// aborted and logged as unexpected failures, and every pending record is
    /// written before this returns.
    pub async fn run<F>(&self, source: CandidateSource, shutdown: F) -> Result<RunSummary>
    where
        F: Future<Output = ()>,
    {
        let started = Instant::now();
        let total = source.len_hint();
        self.reporter.started(total);
        tracing::info!(
            total = ?total,
            concurrency = self.semaphore.available_permits(),
            log = %self.sink.path().display(),
            "Starting check run"
        );

        let candidates = source.with_metrics(Arc::clone(&self.metrics)).into_stream();
        tokio::pin!(candidates);
        tokio::pin!(shutdown);

        let (abort_tx, abort_rx) = watch::channel(false);
        let mut tasks = JoinSet::new();
        let mut interrupted = false;
        let mut fatal: Option<UrlForgeError> = None;

        loop {
            if self.sink.has_failed() {
                tracing::error!("Result log failed; stopping dispatch");
                break;
            }

            let candidate = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    interrupted = true;
                    break;
                }
                next = candidates.next() => match next {
                    Some(candidate) => candidate,
                    None => break,
                },
            };

            let permit = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    interrupted = true;
                    if let Err(e) = self.record_interrupted(candidate).await {
                        fatal = Some(e);
                    }
                    break;
                }
                permit = Arc::clone(&self.semaphore).acquire_owned() => permit,
            };
            let permit = match permit {
                Ok(permit) => permit,
                Err(e) => {
                    fatal = Some(UrlForgeError::unexpected(format!("Worker pool closed: {}", e)));
                    break;
                }
            };

            self.metrics.increment_dispatched();
            let validator = self.clone();
            let abort = abort_rx.clone();
            tasks.spawn(async move {
                let _permit = permit;
                validator.process(candidate, Some(abort)).await
            });
        }

        if interrupted {
            tracing::warn!(in_flight = tasks.len(), "Interrupted; aborting in-flight probes");
            self.reporter.note("⚠️  Interrupted, recording in-flight checks...");
            let _ = abort_tx.send(true);
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "Check task failed");
                    fatal.get_or_insert(e);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Check task did not complete");
                    fatal.get_or_insert_with(|| UrlForgeError::unexpected(format!("Check task did not complete: {}", e)));
                }
            }
        }

        let summary = RunSummary {
            metrics: self.metrics.snapshot(),
            interrupted,
            elapsed: started.elapsed(),
            log_path: self.sink.path().to_path_buf(),
            archive_root: self.archiver.as_ref().map(|a| a.root().to_path_buf()),
        };
        self.reporter.finished(&summary);

        tracing::info!(
            dispatched = summary.metrics.dispatched,
            succeeded = summary.metrics.succeeded,
            failures = summary.metrics.failures(),
            interrupted,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Check run finished"
        );

        match fatal {
            Some(e) => Err(e),
            None => Ok(summary),
        }
    }
}

/// Resolves once `abort` flips to true; never resolves without a receiver
async fn wait_for_abort(abort: Option<watch::Receiver<bool>>) {
    let mut rx = match abort {
        Some(rx) => rx,
        None => return std::future::pending().await,
    };
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return std::future::pending().await;
        }
    }
}

fn classify_failure(url: &str, err: UrlForgeError) -> ValidationOutcome {
    match err {
        UrlForgeError::Network {
            message, status_code, ..
        } => {
            let status = status_code.map_or(String::new(), |c| format!(" (status {})", c));
            ValidationOutcome::NetworkFailure {
                message: format!("Error while checking {}: {}{}", url, message, status),
            }
        }
        UrlForgeError::Unexpected { message } => ValidationOutcome::UnexpectedFailure {
            message: unknown_failure(url, message),
        },
        other => ValidationOutcome::UnexpectedFailure {
            message: unknown_failure(url, other.to_string()),
        },
    }
}

fn unknown_failure(url: &str, detail: impl std::fmt::Display) -> String {
    format!("Unknown error while checking {}: {}", url, detail)
}

fn interrupted(url: &str) -> ValidationOutcome {
    ValidationOutcome::UnexpectedFailure {
        message: unknown_failure(url, "interrupted before completion"),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}
