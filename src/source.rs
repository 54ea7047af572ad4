//! Candidate sources: ordered or random pattern instantiations, or plain lines

use crate::error::{Result, UrlForgeError};
use crate::pattern::{BoundedPattern, OrderedCandidates, Pattern};
use crate::types::{Candidate, GenerationConfig, RunMetrics, SortMode};
use futures::stream::{self, Stream};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;

enum SourceKind {
    Ordered(OrderedCandidates),
    Random {
        pattern: BoundedPattern,
        rng: StdRng,
        remaining: u64,
    },
    Lines(std::vec::IntoIter<String>),
}

/// Indexed, optionally paced sequence of candidates
pub struct CandidateSource {
    kind: SourceKind,
    interval: Duration,
    next_index: u64,
    metrics: Option<Arc<RunMetrics>>,
}

impl CandidateSource {
    fn from_kind(kind: SourceKind) -> Self {
        Self {
            kind,
            interval: Duration::ZERO,
            next_index: 1,
            metrics: None,
        }
    }

    /// Every instantiation in enumeration order, capped by the limit
    pub fn ordered(ordered: OrderedCandidates) -> Self {
        Self::from_kind(SourceKind::Ordered(ordered))
    }

    /// `count` independent samples; duplicates are possible
    pub fn random(pattern: BoundedPattern, count: u64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::from_kind(SourceKind::Random {
            pattern,
            rng,
            remaining: count,
        })
    }

    /// Pre-existing candidates, one per line; blank lines are skipped
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let lines: Vec<String> = lines
            .into_iter()
            .map(|line| line.as_ref().trim().to_string())
            .filter(|line| !line.is_empty())
            .collect();
        Self::from_kind(SourceKind::Lines(lines.into_iter()))
    }

    /// Build the source a generation config asks for
    pub fn from_config(config: &GenerationConfig) -> Result<Self> {
        let pattern = Pattern::parse(&config.pattern)?;
        let bounded = pattern.bounded(config.limit)?;
        let source = match config.sort {
            SortMode::Natural => Self::ordered(bounded.into_ordered()),
            SortMode::Random => Self::random(bounded, config.count, config.seed),
        };
        Ok(source.with_interval(config.interval))
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Number candidates from `index` instead of 1
    pub fn starting_at(mut self, index: u64) -> Self {
        self.next_index = index.max(1);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<RunMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of candidates still to come, when it fits in a `u64`
    pub fn len_hint(&self) -> Option<u64> {
        match &self.kind {
            SourceKind::Ordered(ordered) => u64::try_from(ordered.remaining()).ok(),
            SourceKind::Random { remaining, .. } => Some(*remaining),
            SourceKind::Lines(lines) => Some(lines.len() as u64),
        }
    }

    fn next_raw(&mut self) -> Option<String> {
        match &mut self.kind {
            SourceKind::Ordered(ordered) => ordered.next(),
            SourceKind::Random {
                pattern,
                rng,
                remaining,
            } => {
                if *remaining == 0 {
                    return None;
                }
                *remaining -= 1;
                Some(pattern.sample(rng))
            }
            SourceKind::Lines(lines) => lines.next(),
        }
    }

    /// Paced stream of candidates: sleeps `interval` between emissions,
    /// never before the first.
    ///
    /// The sleep happens before the next candidate is pulled, so dropping
    /// the stream mid-pause loses no indexed candidate.
    pub fn into_stream(self) -> impl Stream<Item = Candidate> + Send {
        stream::unfold((self, true), |(mut source, first)| async move {
            let pause = !first && !source.interval.is_zero() && source.len_hint() != Some(0);
            if pause {
                tokio::time::sleep(source.interval).await;
            }
            let candidate = source.next()?;
            Some((candidate, (source, false)))
        })
    }
}

/// Candidates must fit on one line of the output or log
fn check_generated(value: &str) -> Result<()> {
    if value.contains(|c: char| c == '\n' || c == '\r') {
        return Err(UrlForgeError::generation(format!(
            "candidate {:?} contains a line break",
            value
        )));
    }
    Ok(())
}

/// Unpaced iteration; indices are assigned here
impl Iterator for CandidateSource {
    type Item = Candidate;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let value = self.next_raw()?;
            if let Err(e) = check_generated(&value) {
                tracing::warn!(error = %e, "Skipping candidate");
                if let Some(metrics) = &self.metrics {
                    metrics.increment_generation_failures();
                }
                continue;
            }

            let index = self.next_index;
            self.next_index += 1;
            return Some(Candidate { index, value });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Limit;
    use futures::StreamExt;
    use std::time::Instant;

    fn config(pattern: &str, sort: SortMode) -> GenerationConfig {
        GenerationConfig {
            pattern: pattern.to_string(),
            sort,
            interval: Duration::ZERO,
            ..Default::default()
        }
    }

    #[test]
    fn test_ordered_source_indices_start_at_one() {
        let source = CandidateSource::from_config(&config("x[0-2]", SortMode::Natural)).unwrap();
        assert_eq!(source.len_hint(), Some(3));
        let candidates: Vec<Candidate> = source.collect();
        assert_eq!(
            candidates,
            vec![
                Candidate { index: 1, value: "x0".into() },
                Candidate { index: 2, value: "x1".into() },
                Candidate { index: 3, value: "x2".into() },
            ]
        );
    }

    #[test]
    fn test_random_source_emits_count() {
        let mut cfg = config("[a-z]{4}", SortMode::Random);
        cfg.count = 25;
        cfg.seed = Some(9);
        let values: Vec<Candidate> = CandidateSource::from_config(&cfg).unwrap().collect();
        assert_eq!(values.len(), 25);
        assert_eq!(values.last().map(|c| c.index), Some(25));
        assert!(values.iter().all(|c| c.value.len() == 4));
    }

    #[test]
    fn test_ordered_source_respects_limit() {
        let mut cfg = config("[0-9]{3}", SortMode::Natural);
        cfg.limit = Limit::new(4);
        let values: Vec<String> = CandidateSource::from_config(&cfg)
            .unwrap()
            .map(|c| c.value)
            .collect();
        assert_eq!(values, vec!["000", "001", "002", "003"]);
    }

    #[test]
    fn test_starting_at_offsets_indices() {
        let indices: Vec<u64> = CandidateSource::from_lines(["a", "b"])
            .starting_at(8)
            .map(|c| c.index)
            .collect();
        assert_eq!(indices, vec![8, 9]);
    }

    #[test]
    fn test_lines_skip_blanks() {
        let source = CandidateSource::from_lines(["https://a.io/1", "", "  ", " https://a.io/2 "]);
        assert_eq!(source.len_hint(), Some(2));
        let values: Vec<Candidate> = source.collect();
        assert_eq!(values[1], Candidate { index: 2, value: "https://a.io/2".into() });
    }

    #[test]
    fn test_line_breaks_skipped_without_consuming_index() {
        let metrics = Arc::new(RunMetrics::new());
        let source = CandidateSource::from_config(&config(r"a(\n|b|c)", SortMode::Natural))
            .unwrap()
            .with_metrics(Arc::clone(&metrics));
        let values: Vec<Candidate> = source.collect();
        assert_eq!(
            values,
            vec![
                Candidate { index: 1, value: "ab".into() },
                Candidate { index: 2, value: "ac".into() },
            ]
        );
        assert_eq!(metrics.snapshot().generation_failures, 1);
    }

    #[test]
    fn test_invalid_pattern_fails_up_front() {
        assert!(matches!(
            CandidateSource::from_config(&config("(abc", SortMode::Natural)),
            Err(UrlForgeError::PatternSyntax { .. })
        ));
    }

    #[tokio::test]
    async fn test_stream_paces_between_emissions() {
        let source = CandidateSource::from_lines(["a", "b", "c"]).with_interval(Duration::from_millis(40));
        let start = Instant::now();
        let mut stream = Box::pin(source.into_stream());

        let first = stream.next().await.unwrap();
        assert_eq!(first.value, "a");
        assert!(start.elapsed() < Duration::from_millis(40));

        let rest: Vec<Candidate> = stream.collect().await;
        assert_eq!(rest.len(), 2);
        assert!(start.elapsed() >= Duration::from_millis(80));
    }
}
