//! Integration tests for url-forge

mod common;

use common::TestServer;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use url_forge::{
    read_log, CandidateSource, CheckConfig, GenerationConfig, LogEntry, NullReporter, ResultSink,
    RunContext, SortMode, UrlForgeError, Validator,
};

fn check_config(dir: &TempDir) -> CheckConfig {
    CheckConfig {
        concurrency: 4,
        timeout: Duration::from_secs(2),
        interval: Duration::ZERO,
        log_path: dir.path().join("log").join("run.yaml"),
        archive_root: dir.path().join("contents").join("run"),
        ..Default::default()
    }
}

fn natural(pattern: String) -> GenerationConfig {
    GenerationConfig {
        pattern,
        sort: SortMode::Natural,
        interval: Duration::ZERO,
        ..Default::default()
    }
}

fn never() -> std::future::Pending<()> {
    std::future::pending()
}

#[tokio::test]
async fn test_scan_records_every_candidate_once() {
    let server = TestServer::spawn().await;
    let dir = TempDir::new().unwrap();
    let pattern = format!("{}/ok/[0-9]", server.origin_pattern());
    let ctx = RunContext::new(natural(pattern), check_config(&dir));

    let summary = ctx.scan(never()).await.unwrap();
    assert!(!summary.interrupted);
    assert_eq!(summary.metrics.dispatched, 10);
    assert_eq!(summary.metrics.succeeded, 10);

    let log = read_log(&summary.log_path).unwrap();
    assert_eq!(log.keys().copied().collect::<Vec<_>>(), (1..=10).collect::<Vec<u64>>());
    for (index, entry) in &log {
        assert_eq!(entry.url(), server.url(&format!("/ok/{}", index - 1)));
        match entry {
            LogEntry::Success { status_code, headers, .. } => {
                assert_eq!(*status_code, 200);
                assert_eq!(headers.get("x-tag"), Some("a, b"));
                assert_eq!(headers.get("content-type"), Some("text/html"));
            }
            other => panic!("unexpected entry {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_non_success_status_is_still_recorded() {
    let server = TestServer::spawn().await;
    let dir = TempDir::new().unwrap();
    let ctx = RunContext::new(GenerationConfig::default(), check_config(&dir));

    let summary = ctx
        .check(vec![server.url("/missing/a"), server.url("/ok/b")], never())
        .await
        .unwrap();

    let log = read_log(&summary.log_path).unwrap();
    assert_eq!(log[&1].status_code(), Some(404));
    assert_eq!(log[&2].status_code(), Some(200));
    assert_eq!(summary.metrics.succeeded, 2);
}

#[tokio::test]
async fn test_timeout_does_not_block_other_candidates() {
    let server = TestServer::spawn().await;
    let dir = TempDir::new().unwrap();
    let config = CheckConfig {
        timeout: Duration::from_millis(300),
        ..check_config(&dir)
    };
    let ctx = RunContext::new(GenerationConfig::default(), config);

    let slow = server.url("/slow/x");
    let started = Instant::now();
    let summary = ctx
        .check(vec![slow.clone(), server.url("/ok/1"), server.url("/ok/2")], never())
        .await
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(3));

    assert_eq!(summary.metrics.network_failures, 1);
    assert_eq!(summary.metrics.succeeded, 2);

    let log = read_log(&summary.log_path).unwrap();
    match &log[&1] {
        LogEntry::Failure { error, url } => {
            assert_eq!(url, &slow);
            assert!(error.starts_with(&format!("Error while checking {}: ", slow)), "{}", error);
        }
        other => panic!("unexpected entry {:?}", other),
    }
}

#[tokio::test]
async fn test_interrupt_leaves_well_formed_subset() {
    let server = TestServer::spawn().await;
    let dir = TempDir::new().unwrap();
    let config = CheckConfig {
        timeout: Duration::from_secs(30),
        ..check_config(&dir)
    };
    let pattern = format!("{}/slow/[0-9]{{2}}", server.origin_pattern());
    let ctx = RunContext::new(natural(pattern), config);

    let started = Instant::now();
    let summary = ctx
        .scan(tokio::time::sleep(Duration::from_millis(300)))
        .await
        .unwrap();
    assert!(summary.interrupted);
    assert!(started.elapsed() < Duration::from_secs(4));
    assert_eq!(summary.metrics.dispatched, summary.metrics.completed);

    let log = read_log(&summary.log_path).unwrap();
    assert!(!log.is_empty());
    assert!(log.len() < 100);
    assert_eq!(log.len() as u64, summary.metrics.completed);
    for (index, entry) in &log {
        assert!((1..=100).contains(index));
        match entry {
            LogEntry::Failure { error, .. } => {
                assert!(error.starts_with("Unknown error while checking"), "{}", error);
            }
            other => panic!("unexpected entry {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_interrupt_records_candidate_waiting_for_worker() {
    let server = TestServer::spawn().await;
    let dir = TempDir::new().unwrap();
    let config = CheckConfig {
        concurrency: 1,
        timeout: Duration::from_secs(30),
        ..check_config(&dir)
    };
    let ctx = RunContext::new(GenerationConfig::default(), config);
    let urls = vec![server.url("/slow/1"), server.url("/slow/2"), server.url("/slow/3")];

    let summary = ctx
        .check(urls.clone(), tokio::time::sleep(Duration::from_millis(300)))
        .await
        .unwrap();
    assert!(summary.interrupted);
    assert_eq!(summary.metrics.dispatched, 2);
    assert_eq!(summary.metrics.unexpected_failures, 2);

    // 1 was in flight, 2 was pulled but never got a worker, 3 was never pulled
    let log = read_log(&summary.log_path).unwrap();
    assert_eq!(log.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
    for (index, entry) in &log {
        match entry {
            LogEntry::Failure { error, url } => {
                assert_eq!(url, &urls[*index as usize - 1]);
                assert!(error.starts_with(&format!("Unknown error while checking {}", url)), "{}", error);
                assert!(error.contains("interrupted before completion"), "{}", error);
            }
            other => panic!("unexpected entry {:?}", other),
        }
    }
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_log_write_failure_stops_the_run() {
    let full = Path::new("/dev/full");
    if !full.exists() {
        return;
    }
    let server = TestServer::spawn().await;
    let dir = TempDir::new().unwrap();
    let config = CheckConfig {
        concurrency: 1,
        ..check_config(&dir)
    };

    let sink = Arc::new(ResultSink::open(full).await.unwrap());
    let validator = Validator::new(&config, Arc::clone(&sink), Arc::new(NullReporter)).unwrap();
    let metrics = validator.metrics();
    let urls: Vec<String> = (0..20).map(|i| server.url(&format!("/ok/{}", i))).collect();

    let result = validator
        .run(CandidateSource::from_lines(urls), std::future::pending())
        .await;

    assert!(matches!(result, Err(UrlForgeError::SinkWrite { .. })), "{:?}", result.map(|s| s.metrics));
    assert!(sink.has_failed());
    let snapshot = metrics.snapshot();
    assert!(snapshot.dispatched < 20, "dispatched {}", snapshot.dispatched);
    assert_eq!(snapshot.completed, 0);
}

#[tokio::test]
async fn test_reused_log_path_continues_numbering() {
    let server = TestServer::spawn().await;
    let dir = TempDir::new().unwrap();
    let ctx = RunContext::new(GenerationConfig::default(), check_config(&dir));

    let first = ctx
        .check(vec![server.url("/ok/a"), server.url("/ok/b")], never())
        .await
        .unwrap();
    let second = ctx
        .check(vec![server.url("/ok/c"), server.url("/missing/d")], never())
        .await
        .unwrap();
    assert_eq!(first.log_path, second.log_path);

    let log = read_log(&second.log_path).unwrap();
    assert_eq!(log.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
    assert_eq!(log[&1].url(), server.url("/ok/a"));
    assert_eq!(log[&3].url(), server.url("/ok/c"));
    assert_eq!(log[&4].status_code(), Some(404));
}

#[tokio::test]
async fn test_download_archives_bodies() {
    let server = TestServer::spawn().await;
    let dir = TempDir::new().unwrap();
    let config = CheckConfig {
        download: true,
        ..check_config(&dir)
    };
    let archive_root = config.archive_root.clone();
    let ctx = RunContext::new(GenerationConfig::default(), config);

    let summary = ctx
        .check(
            vec![server.url("/ok/report.txt"), server.url("/flaky/page"), server.url("/missing/x")],
            never(),
        )
        .await
        .unwrap();

    assert_eq!(summary.archive_root.as_deref(), Some(archive_root.as_path()));
    assert_eq!(summary.metrics.archived, 1);
    assert_eq!(summary.metrics.archive_failures, 1);

    let stored: Vec<_> = std::fs::read_dir(&archive_root)
        .unwrap()
        .map(|entry| entry.unwrap().path().join("report.txt"))
        .filter(|path| path.exists())
        .collect();
    assert_eq!(stored.len(), 1);
    assert_eq!(std::fs::read_to_string(&stored[0]).unwrap(), "hello /ok/report.txt");

    // The failed download leaves its successful HEAD outcome untouched
    let log = read_log(&summary.log_path).unwrap();
    assert_eq!(log[&2].status_code(), Some(200));
}

#[tokio::test]
async fn test_random_scan_uses_count() {
    let server = TestServer::spawn().await;
    let dir = TempDir::new().unwrap();
    let generation = GenerationConfig {
        pattern: format!("{}/ok/[a-z]{{4}}", server.origin_pattern()),
        sort: SortMode::Random,
        count: 6,
        interval: Duration::ZERO,
        seed: Some(11),
        ..Default::default()
    };
    let ctx = RunContext::new(generation, check_config(&dir));

    let summary = ctx.scan(never()).await.unwrap();
    assert_eq!(summary.metrics.completed, 6);
    assert_eq!(read_log(&summary.log_path).unwrap().len(), 6);
    assert!(server.hits() >= 6);
}

#[tokio::test]
async fn test_bad_pattern_fails_before_probing() {
    let dir = TempDir::new().unwrap();
    let ctx = RunContext::new(natural("https://x.io/(abc".to_string()), check_config(&dir));
    assert!(matches!(
        ctx.scan(never()).await,
        Err(UrlForgeError::PatternSyntax { .. })
    ));
    assert!(!dir.path().join("log").join("run.yaml").exists());
}

#[tokio::test]
async fn test_unusable_log_path_is_fatal() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("file");
    std::fs::write(&blocker, "not a directory").unwrap();
    let config = CheckConfig {
        log_path: blocker.join("run.yaml"),
        ..check_config(&dir)
    };
    let ctx = RunContext::new(GenerationConfig::default(), config);
    let err = ctx.check(vec!["http://127.0.0.1:9/".to_string()], never()).await.unwrap_err();
    assert!(err.is_fatal());
}
