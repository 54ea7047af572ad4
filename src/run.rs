//! One invocation of the tool: configuration plus the flows that use it

use crate::error::{Result, UrlForgeError};
use crate::pattern::{Matcher, Pattern};
use crate::probe::{DirectoryArchiver, ResultSink, Validator};
use crate::report::{NullReporter, Reporter};
use crate::source::CandidateSource;
use crate::types::{CheckConfig, GenerationConfig, Limit, RunMetrics, RunSummary, SortMode};
use futures::StreamExt;
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};

/// Result of a `generate` flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateSummary {
    /// Size of the ordered search space
    pub search_space: u128,
    pub limit: Limit,
    pub written: u64,
    pub generation_failures: u64,
    /// Shutdown fired before the source was exhausted
    pub interrupted: bool,
}

/// Owns configuration and collaborators for one run
pub struct RunContext {
    generation: GenerationConfig,
    check: CheckConfig,
    reporter: Arc<dyn Reporter>,
}

impl RunContext {
    pub fn new(generation: GenerationConfig, check: CheckConfig) -> Self {
        Self {
            generation,
            check,
            reporter: Arc::new(NullReporter),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn generation(&self) -> &GenerationConfig {
        &self.generation
    }

    pub fn check_config(&self) -> &CheckConfig {
        &self.check
    }

    /// Size of the configured pattern's search space under its limit
    pub fn search_space(&self) -> Result<u128> {
        Pattern::parse(&self.generation.pattern)?.count(self.generation.limit)
    }

    /// Write candidates one per line to `out` until the source is exhausted
    /// or `shutdown` resolves.
    ///
    /// Ordered enumeration is written as fast as possible; random sampling
    /// is paced by the configured interval and flushed line by line. Output
    /// is always flushed before returning, including on shutdown.
    pub async fn generate<W, F>(&self, out: W, shutdown: F) -> Result<GenerateSummary>
    where
        W: AsyncWrite + Unpin,
        F: Future<Output = ()>,
    {
        let pattern = Pattern::parse(&self.generation.pattern)?;
        let limit = self.generation.limit;
        let search_space = pattern.count(limit)?;

        let metrics = Arc::new(RunMetrics::new());
        let mut source = CandidateSource::from_config(&self.generation)?.with_metrics(Arc::clone(&metrics));
        if self.generation.sort == SortMode::Natural {
            source = source.with_interval(Duration::ZERO);
        }
        let paced = !source.interval().is_zero();

        tracing::info!(
            pattern = %pattern,
            sort = %self.generation.sort,
            total = ?source.len_hint(),
            "Generating candidates"
        );

        let mut out = BufWriter::new(out);
        let mut written = 0u64;
        let mut interrupted = false;
        let candidates = source.into_stream();
        tokio::pin!(candidates);
        tokio::pin!(shutdown);

        loop {
            let candidate = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    interrupted = true;
                    break;
                }
                candidate = candidates.next() => match candidate {
                    Some(candidate) => candidate,
                    None => break,
                },
            };

            out.write_all(candidate.value.as_bytes()).await?;
            out.write_all(b"\n").await?;
            if paced {
                out.flush().await?;
            }
            written += 1;
        }
        out.flush().await?;

        if interrupted {
            tracing::info!(written, "Generation interrupted");
        }

        Ok(GenerateSummary {
            search_space,
            limit,
            written,
            generation_failures: metrics.snapshot().generation_failures,
            interrupted,
        })
    }

    /// Validate pre-existing URLs
    pub async fn check<F>(&self, urls: Vec<String>, shutdown: F) -> Result<RunSummary>
    where
        F: Future<Output = ()>,
    {
        let source = CandidateSource::from_lines(urls).with_interval(self.check.interval);
        self.validate(source, shutdown).await
    }

    /// Stream generated candidates straight into the validator
    pub async fn scan<F>(&self, shutdown: F) -> Result<RunSummary>
    where
        F: Future<Output = ()>,
    {
        let source = CandidateSource::from_config(&self.generation)?;
        self.validate(source, shutdown).await
    }

    async fn validate<F>(&self, source: CandidateSource, shutdown: F) -> Result<RunSummary>
    where
        F: Future<Output = ()>,
    {
        let sink = Arc::new(ResultSink::open(&self.check.log_path).await?);
        let source = source.starting_at(sink.next_index());
        let mut validator = Validator::new(&self.check, sink, Arc::clone(&self.reporter))?;
        if self.check.download {
            let archiver = DirectoryArchiver::new(&self.check.archive_root);
            validator = validator.with_archiver(Arc::new(archiver));
        }
        validator.run(source, shutdown).await
    }
}

/// Classify `lines` against `pattern`, writing one verdict per line.
///
/// The pattern is compiled before any line is looked at. Returns the number
/// of matching lines.
pub fn match_lines<I, W>(pattern: &str, lines: I, json: bool, out: &mut W) -> Result<usize>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
    W: Write,
{
    let matcher = Matcher::new(pattern)?;
    let mut matched = 0;
    for result in matcher.classify(lines) {
        if json {
            writeln!(out, "{}", serde_json::to_string(&result)?)?;
        } else if result.matched {
            writeln!(out, "{} matches the regex.", result.line)?;
        } else {
            writeln!(out, "{} does not match the regex.", result.line)?;
        }
        if result.matched {
            matched += 1;
        }
    }
    out.flush()?;
    Ok(matched)
}

/// Read lines from the given files, or from stdin when none (or `-`) is given
pub async fn read_lines(inputs: &[PathBuf]) -> Result<Vec<String>> {
    if inputs.is_empty() {
        return read_stdin().await;
    }

    let mut lines = Vec::new();
    for input in inputs {
        let content = if input == Path::new("-") {
            read_stdin_string().await?
        } else {
            tokio::fs::read_to_string(input)
                .await
                .map_err(|e| UrlForgeError::io(e.to_string(), Some(input.display().to_string())))?
        };
        lines.extend(content.lines().map(str::to_string));
    }
    Ok(lines)
}

async fn read_stdin() -> Result<Vec<String>> {
    Ok(read_stdin_string().await?.lines().map(str::to_string).collect())
}

async fn read_stdin_string() -> Result<String> {
    let mut content = String::new();
    tokio::io::stdin()
        .read_to_string(&mut content)
        .await
        .map_err(|e| UrlForgeError::io(e.to_string(), Some("<stdin>".to_string())))?;
    Ok(content)
}
