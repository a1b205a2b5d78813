//! Engine behavior tests using stub pipeline stages
//!
//! These exercise skip/resume/recheck semantics, retry behavior, and
//! concurrency bounds without any real network or LLM involved.

use async_trait::async_trait;
use marginalia::checkpoint::{CheckpointError, CheckpointStore};
use marginalia::engine::{ProcessingEngine, RunMode};
use marginalia::fetch::Fetcher;
use marginalia::output::{OutputResult, ProcessedPage, Writer};
use marginalia::summarize::Summarizer;
use marginalia::tree::{Bookmark, BookmarkEntry, BookmarkFolder, WorkItem};
use marginalia::{Config, StageError, StageResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Fetcher that fails the first `failures_before_success` calls per URL with
/// a transient error, tracks call counts, and tracks peak concurrency.
struct StubFetcher {
    failures_before_success: usize,
    permanent_failures: Vec<String>,
    timeout_forever: Vec<String>,
    calls: Mutex<HashMap<String, usize>>,
    concurrent: AtomicUsize,
    peak_concurrent: AtomicUsize,
}

impl StubFetcher {
    fn new() -> Self {
        Self {
            failures_before_success: 0,
            permanent_failures: Vec::new(),
            timeout_forever: Vec::new(),
            calls: Mutex::new(HashMap::new()),
            concurrent: AtomicUsize::new(0),
            peak_concurrent: AtomicUsize::new(0),
        }
    }

    fn calls_for(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, url: &str) -> StageResult<String> {
        let current = self.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_concurrent.fetch_max(current, Ordering::SeqCst);

        // Give overlapping fetches a chance to actually overlap
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        self.concurrent.fetch_sub(1, Ordering::SeqCst);

        let count = {
            let mut calls = self.calls.lock().unwrap();
            let entry = calls.entry(url.to_string()).or_insert(0);
            *entry += 1;
            *entry
        };

        if self.permanent_failures.iter().any(|u| u == url) {
            return Err(StageError::permanent("HTTP 404"));
        }
        if self.timeout_forever.iter().any(|u| u == url) {
            return Err(StageError::transient(format!("timeout #{count}")));
        }
        if count <= self.failures_before_success {
            return Err(StageError::transient(format!("timeout #{count}")));
        }
        Ok(format!("<html><body>page at {url}</body></html>"))
    }
}

struct StubSummarizer;

#[async_trait]
impl Summarizer for StubSummarizer {
    async fn summarize(&self, title: &str, _content: &str) -> StageResult<String> {
        Ok(format!("Summary of {title}"))
    }
}

/// Writer that requests a graceful stop when a chosen URL reaches the write
/// stage, then lingers so items parked in retry backoff observe the signal.
struct CancellingWriter {
    cancel_on: String,
    token: Mutex<Option<CancellationToken>>,
    written: Mutex<Vec<String>>,
}

#[async_trait]
impl Writer for CancellingWriter {
    async fn write(&self, item: &WorkItem, _page: &ProcessedPage) -> OutputResult<String> {
        if item.url() == self.cancel_on {
            if let Some(token) = self.token.lock().unwrap().clone() {
                token.cancel();
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
        self.written.lock().unwrap().push(item.url().to_string());
        Ok(format!("{}.md", item.title()))
    }
}

struct RecordingWriter {
    written: Mutex<Vec<String>>,
}

impl RecordingWriter {
    fn new() -> Self {
        Self {
            written: Mutex::new(Vec::new()),
        }
    }

    fn urls(&self) -> Vec<String> {
        self.written.lock().unwrap().clone()
    }
}

#[async_trait]
impl Writer for RecordingWriter {
    async fn write(&self, item: &WorkItem, _page: &ProcessedPage) -> OutputResult<String> {
        self.written.lock().unwrap().push(item.url().to_string());
        Ok(format!("{}.md", item.title()))
    }
}

fn flat_tree(urls: &[&str]) -> BookmarkFolder {
    BookmarkFolder {
        name: "Root".to_string(),
        entries: urls
            .iter()
            .map(|url| {
                BookmarkEntry::Bookmark(Bookmark {
                    title: url.to_string(),
                    url: url.to_string(),
                    date_added: None,
                })
            })
            .collect(),
    }
}

fn work_item(url: &str, index: usize, total: usize) -> WorkItem {
    WorkItem {
        bookmark: Bookmark {
            title: url.to_string(),
            url: url.to_string(),
            date_added: None,
        },
        folder_path: vec!["Root".to_string()],
        index,
        total_in_folder: total,
    }
}

fn quick_config() -> Config {
    let mut config = Config::default();
    config.fetch.retry_attempts = 0;
    config.fetch.retry_delay_ms = 1;
    config.fetch.rate_limit = 0;
    config.summarize.retry_attempts = 0;
    config.summarize.retry_delay_ms = 1;
    config.llm.rate_limit = 0;
    config
}

fn checkpoint_in(dir: &TempDir) -> Arc<CheckpointStore> {
    Arc::new(CheckpointStore::create(
        dir.path().join("progress.json"),
        "bookmarks.json",
        "hash1",
    ))
}

fn build_engine(
    config: Config,
    checkpoint: Arc<CheckpointStore>,
    fetcher: Arc<StubFetcher>,
    writer: Arc<RecordingWriter>,
    mode: RunMode,
) -> ProcessingEngine {
    ProcessingEngine::new(
        config,
        checkpoint,
        fetcher,
        Arc::new(StubSummarizer),
        writer,
        mode,
    )
}

#[tokio::test]
async fn mixed_outcomes_recorded_exactly_once() {
    let dir = TempDir::new().unwrap();
    let checkpoint = checkpoint_in(&dir);
    let fetcher = Arc::new(StubFetcher {
        permanent_failures: vec!["https://b.example/".to_string()],
        ..StubFetcher::new()
    });
    let writer = Arc::new(RecordingWriter::new());

    let engine = build_engine(
        quick_config(),
        checkpoint.clone(),
        fetcher,
        writer,
        RunMode::Fresh,
    );
    let outcome = engine
        .run(&flat_tree(&["https://a.example/", "https://b.example/"]))
        .await
        .unwrap();

    assert_eq!(outcome.processed, 1);
    assert_eq!(outcome.failed, 1);

    let processed = checkpoint.processed_urls();
    let failed = checkpoint.failed_urls();
    assert!(processed.contains("https://a.example/"));
    assert!(failed.contains("https://b.example/"));
    // A URL never lands in both sets
    assert!(processed.intersection(&failed).next().is_none());
}

#[tokio::test]
async fn transient_failures_retry_until_success() {
    let dir = TempDir::new().unwrap();
    let checkpoint = checkpoint_in(&dir);
    let fetcher = Arc::new(StubFetcher {
        failures_before_success: 2,
        ..StubFetcher::new()
    });
    let writer = Arc::new(RecordingWriter::new());

    let mut config = quick_config();
    config.fetch.retry_attempts = 3;

    let engine = build_engine(config, checkpoint.clone(), fetcher.clone(), writer, RunMode::Fresh);
    let outcome = engine.run(&flat_tree(&["https://flaky.example/"])).await.unwrap();

    assert_eq!(outcome.processed, 1);
    assert_eq!(outcome.failed, 0);
    // Two transient failures, then the successful third attempt
    assert_eq!(fetcher.calls_for("https://flaky.example/"), 3);
}

#[tokio::test]
async fn exhausted_retries_record_one_failure() {
    let dir = TempDir::new().unwrap();
    let checkpoint = checkpoint_in(&dir);
    let fetcher = Arc::new(StubFetcher {
        failures_before_success: 100,
        ..StubFetcher::new()
    });
    let writer = Arc::new(RecordingWriter::new());

    let mut config = quick_config();
    config.fetch.retry_attempts = 2;

    let engine = build_engine(config, checkpoint.clone(), fetcher.clone(), writer, RunMode::Fresh);
    let outcome = engine.run(&flat_tree(&["https://down.example/"])).await.unwrap();

    assert_eq!(outcome.failed, 1);
    // Initial attempt plus two retries
    assert_eq!(fetcher.calls_for("https://down.example/"), 3);
    assert_eq!(checkpoint.failed_urls().len(), 1);
    assert!(checkpoint.processed_urls().is_empty());
}

#[tokio::test]
async fn fetch_concurrency_never_exceeds_limit() {
    let dir = TempDir::new().unwrap();
    let checkpoint = checkpoint_in(&dir);
    let fetcher = Arc::new(StubFetcher::new());
    let writer = Arc::new(RecordingWriter::new());

    let mut config = quick_config();
    config.fetch.max_concurrent = 3;

    let urls: Vec<String> = (0..20).map(|i| format!("https://s{i}.example/")).collect();
    let url_refs: Vec<&str> = urls.iter().map(|s| s.as_str()).collect();

    let engine = build_engine(config, checkpoint, fetcher.clone(), writer, RunMode::Fresh);
    let outcome = engine.run(&flat_tree(&url_refs)).await.unwrap();

    assert_eq!(outcome.processed, 20);
    assert!(fetcher.peak_concurrent.load(Ordering::SeqCst) <= 3);
}

#[tokio::test]
async fn resume_skips_exactly_the_processed_items() {
    let dir = TempDir::new().unwrap();
    let checkpoint = checkpoint_in(&dir);

    // Previous run finished 2 of 5 items
    checkpoint.record_success(&work_item("https://a.example/", 0, 5), None);
    checkpoint.record_success(&work_item("https://b.example/", 1, 5), None);

    let fetcher = Arc::new(StubFetcher::new());
    let writer = Arc::new(RecordingWriter::new());
    let engine = build_engine(
        quick_config(),
        checkpoint.clone(),
        fetcher.clone(),
        writer.clone(),
        RunMode::Resume,
    );

    let outcome = engine
        .run(&flat_tree(&[
            "https://a.example/",
            "https://b.example/",
            "https://c.example/",
            "https://d.example/",
            "https://e.example/",
        ]))
        .await
        .unwrap();

    assert_eq!(outcome.skipped, 2);
    assert_eq!(outcome.processed, 3);
    assert_eq!(fetcher.calls_for("https://a.example/"), 0);
    assert_eq!(fetcher.calls_for("https://b.example/"), 0);
    let written = writer.urls();
    assert!(written.contains(&"https://c.example/".to_string()));
    assert!(!written.contains(&"https://a.example/".to_string()));
}

#[tokio::test]
async fn interrupted_run_never_strands_an_unrecorded_item() {
    let dir = TempDir::new().unwrap();
    let checkpoint = checkpoint_in(&dir);

    // Item A keeps timing out and parks in a long retry backoff; item B
    // sails through and triggers cancellation from its write stage. B's
    // success must not advance the saved position past A.
    let fetcher = Arc::new(StubFetcher {
        timeout_forever: vec!["https://a.example/".to_string()],
        ..StubFetcher::new()
    });
    let writer = Arc::new(CancellingWriter {
        cancel_on: "https://b.example/".to_string(),
        token: Mutex::new(None),
        written: Mutex::new(Vec::new()),
    });

    let mut config = quick_config();
    config.fetch.retry_attempts = 3;
    config.fetch.retry_delay_ms = 60_000;

    let engine = ProcessingEngine::new(
        config,
        checkpoint.clone(),
        fetcher,
        Arc::new(StubSummarizer),
        writer.clone(),
        RunMode::Fresh,
    );
    *writer.token.lock().unwrap() = Some(engine.cancellation_token());

    let root = flat_tree(&["https://a.example/", "https://b.example/"]);
    let first = engine.run(&root).await.unwrap();

    assert!(first.interrupted);
    assert_eq!(first.processed, 1);
    assert_eq!(first.failed, 0);
    assert!(checkpoint.processed_urls().contains("https://b.example/"));
    // A got neither success nor failure, so the position still points at it
    let position = checkpoint.position().expect("position recorded");
    assert_eq!(position.index, 0);

    // Resuming picks A back up and only skips the item that finished
    let engine = build_engine(
        quick_config(),
        checkpoint.clone(),
        Arc::new(StubFetcher::new()),
        Arc::new(RecordingWriter::new()),
        RunMode::Resume,
    );
    let second = engine.run(&root).await.unwrap();

    assert_eq!(second.processed, 1);
    assert_eq!(second.skipped, 1);
    assert!(checkpoint.processed_urls().contains("https://a.example/"));
}

#[tokio::test]
async fn recheck_failed_moves_exactly_the_failed_urls() {
    let dir = TempDir::new().unwrap();
    let checkpoint = checkpoint_in(&dir);

    checkpoint.record_success(&work_item("https://ok1.example/", 0, 5), None);
    checkpoint.record_success(&work_item("https://ok2.example/", 1, 5), None);
    checkpoint.record_failure(&work_item("https://f1.example/", 2, 5), "HTTP 500");
    checkpoint.record_failure(&work_item("https://f2.example/", 3, 5), "timeout");
    checkpoint.record_failure(&work_item("https://f3.example/", 4, 5), "HTTP 503");

    let fetcher = Arc::new(StubFetcher::new());
    let writer = Arc::new(RecordingWriter::new());
    let engine = build_engine(
        quick_config(),
        checkpoint.clone(),
        fetcher.clone(),
        writer.clone(),
        RunMode::RecheckFailed,
    );

    let outcome = engine
        .run(&flat_tree(&[
            "https://ok1.example/",
            "https://ok2.example/",
            "https://f1.example/",
            "https://f2.example/",
            "https://f3.example/",
        ]))
        .await
        .unwrap();

    // Exactly the three failed URLs were attempted and now count as processed
    assert_eq!(outcome.processed, 3);
    assert_eq!(outcome.skipped, 2);
    assert_eq!(fetcher.calls_for("https://ok1.example/"), 0);
    assert!(checkpoint.failed_urls().is_empty());
    assert_eq!(checkpoint.processed_urls().len(), 5);
}

#[tokio::test]
async fn config_mismatch_refuses_to_resume() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("progress.json");

    let store = CheckpointStore::create(&path, "bookmarks.json", "old-hash");
    store.record_success(&work_item("https://a.example/", 0, 1), None);
    store.flush().unwrap();

    // Loading under a different config hash fails before any processing
    let result = CheckpointStore::load(&path, "bookmarks.json", "new-hash");
    assert!(matches!(
        result,
        Err(CheckpointError::ConfigMismatch { .. })
    ));
}

#[tokio::test]
async fn one_success_one_timeout_yields_matching_statistics() {
    let dir = TempDir::new().unwrap();
    let checkpoint = checkpoint_in(&dir);
    let fetcher = Arc::new(StubFetcher {
        timeout_forever: vec!["https://b.example/".to_string()],
        ..StubFetcher::new()
    });
    let writer = Arc::new(RecordingWriter::new());

    let mut config = quick_config();
    config.fetch.retry_attempts = 3;

    let engine = build_engine(config, checkpoint.clone(), fetcher.clone(), writer, RunMode::Fresh);
    let outcome = engine
        .run(&flat_tree(&["https://a.example/", "https://b.example/"]))
        .await
        .unwrap();

    assert_eq!(outcome.processed, 1);
    assert_eq!(outcome.failed, 1);
    // B was attempted four times: the initial try plus three retries
    assert_eq!(fetcher.calls_for("https://b.example/"), 4);

    assert!(checkpoint.processed_urls().contains("https://a.example/"));
    assert!(checkpoint.failed_urls().contains("https://b.example/"));

    let stats = checkpoint.statistics();
    assert_eq!(stats.processed_count, 1);
    assert_eq!(stats.failed_count, 1);
}

#[tokio::test]
async fn nested_folders_processed_in_source_order() {
    let dir = TempDir::new().unwrap();
    let checkpoint = checkpoint_in(&dir);

    let root = BookmarkFolder {
        name: "Root".to_string(),
        entries: vec![
            BookmarkEntry::Bookmark(Bookmark {
                title: "first".to_string(),
                url: "https://first.example/".to_string(),
                date_added: None,
            }),
            BookmarkEntry::Folder(BookmarkFolder {
                name: "Sub".to_string(),
                entries: vec![BookmarkEntry::Bookmark(Bookmark {
                    title: "nested".to_string(),
                    url: "https://nested.example/".to_string(),
                    date_added: None,
                })],
            }),
            BookmarkEntry::Bookmark(Bookmark {
                title: "last".to_string(),
                url: "https://last.example/".to_string(),
                date_added: None,
            }),
        ],
    };

    let fetcher = Arc::new(StubFetcher::new());
    let writer = Arc::new(RecordingWriter::new());

    // Single-file pipeline keeps completion order equal to admission order
    let mut config = quick_config();
    config.fetch.max_concurrent = 1;
    config.summarize.max_concurrent = 1;
    config.summarize.pipeline_buffer = 0;

    let engine = build_engine(config, checkpoint, fetcher, writer.clone(), RunMode::Fresh);
    engine.run(&root).await.unwrap();

    assert_eq!(
        writer.urls(),
        [
            "https://first.example/",
            "https://nested.example/",
            "https://last.example/"
        ]
    );
}
