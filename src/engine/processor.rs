//! The processing engine
//!
//! Drives the whole pipeline: walks the bookmark tree with a
//! [`TraversalCursor`], skips items the checkpoint already covers, and runs
//! the rest through fetch → extract → summarize → write, each stage behind
//! its own worker pool, rate limiter, and retry policy.
//!
//! Per-item failures are recorded and never stop the run; only a checkpoint
//! flush failure halts it. A cancellation signal stops admission, lets
//! in-flight items drain, and flushes a final checkpoint so the next run can
//! resume.

use crate::checkpoint::CheckpointStore;
use crate::config::Config;
use crate::engine::cursor::TraversalCursor;
use crate::engine::pool::BoundedWorkerPool;
use crate::engine::rate_limit::RateLimiter;
use crate::engine::retry::{RetryError, RetryPolicy};
use crate::fetch::{extract_text, Fetcher};
use crate::output::{ProcessedPage, Writer};
use crate::summarize::Summarizer;
use crate::tree::{BookmarkFolder, WorkItem};
use crate::ExportError;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// What subset of the tree a run operates on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Process everything; the checkpoint starts empty
    Fresh,

    /// Skip items the checkpoint records as processed, retry failed ones,
    /// and continue the traversal from the saved position.
    Resume,

    /// Process only previously failed items
    RecheckFailed,
}

/// Where the engine is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Running,
    Completed,
    Halted,
}

/// Counters for one engine run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutcome {
    /// Items this run processed successfully
    pub processed: u64,
    /// Items this run recorded as terminally failed
    pub failed: u64,
    /// Items skipped because the checkpoint already covers them
    pub skipped: u64,
    /// Whether the run stopped early on a cancellation signal
    pub interrupted: bool,
}

/// Result of one item's trip through the pipeline
enum ItemOutcome {
    Success { output_path: String },
    Failure { error: String },
    Cancelled,
}

/// Shared, immutable pipeline machinery handed to every item task
struct Pipeline {
    fetcher: Arc<dyn Fetcher>,
    summarizer: Arc<dyn Summarizer>,
    writer: Arc<dyn Writer>,
    fetch_pool: BoundedWorkerPool,
    summarize_pool: BoundedWorkerPool,
    fetch_limiter: RateLimiter,
    summarize_limiter: RateLimiter,
    fetch_retry: RetryPolicy,
    summarize_retry: RetryPolicy,
    cancel: CancellationToken,
    extract_budget: usize,
}

impl Pipeline {
    async fn process(&self, item: &WorkItem) -> ItemOutcome {
        let url = item.url().to_string();

        // Fetch stage: pool slot held across all retry attempts, rate-limit
        // permit re-acquired per attempt inside the policy.
        let fetcher = Arc::clone(&self.fetcher);
        let fetch_url = url.clone();
        let body = self
            .fetch_pool
            .run(self.fetch_retry.run(&self.fetch_limiter, &self.cancel, || {
                let fetcher = Arc::clone(&fetcher);
                let url = fetch_url.clone();
                async move { fetcher.fetch(&url).await }
            }))
            .await;

        let body = match body {
            Ok(body) => body,
            Err(RetryError::Cancelled) => return ItemOutcome::Cancelled,
            Err(RetryError::Failed(e)) => {
                return ItemOutcome::Failure {
                    error: format!("fetch: {e}"),
                }
            }
        };

        let text = extract_text(&body, self.extract_budget);
        if text.is_empty() {
            return ItemOutcome::Failure {
                error: "extract: no readable content".to_string(),
            };
        }

        // Summarize stage
        let summarizer = Arc::clone(&self.summarizer);
        let title = item.title().to_string();
        let summary = self
            .summarize_pool
            .run(
                self.summarize_retry
                    .run(&self.summarize_limiter, &self.cancel, || {
                        let summarizer = Arc::clone(&summarizer);
                        let title = title.clone();
                        let text = text.clone();
                        async move { summarizer.summarize(&title, &text).await }
                    }),
            )
            .await;

        let summary = match summary {
            Ok(summary) => summary,
            Err(RetryError::Cancelled) => return ItemOutcome::Cancelled,
            Err(RetryError::Failed(e)) => {
                return ItemOutcome::Failure {
                    error: format!("summarize: {e}"),
                }
            }
        };

        // Write stage; a write failure is an item failure like any other
        let page = ProcessedPage {
            url,
            title: item.title().to_string(),
            summary,
            fetched_at: chrono::Utc::now(),
        };

        match self.writer.write(item, &page).await {
            Ok(output_path) => ItemOutcome::Success { output_path },
            Err(e) => ItemOutcome::Failure {
                error: format!("write: {e}"),
            },
        }
    }
}

/// Orchestrates a full processing run over a bookmark tree
pub struct ProcessingEngine {
    config: Config,
    checkpoint: Arc<CheckpointStore>,
    pipeline: Arc<Pipeline>,
    cancel: CancellationToken,
    mode: RunMode,
    state: std::sync::Mutex<EngineState>,
}

impl ProcessingEngine {
    pub fn new(
        config: Config,
        checkpoint: Arc<CheckpointStore>,
        fetcher: Arc<dyn Fetcher>,
        summarizer: Arc<dyn Summarizer>,
        writer: Arc<dyn Writer>,
        mode: RunMode,
    ) -> Self {
        let cancel = CancellationToken::new();

        let pipeline = Arc::new(Pipeline {
            fetcher,
            summarizer,
            writer,
            fetch_pool: BoundedWorkerPool::new("fetch", config.fetch.max_concurrent as usize),
            summarize_pool: BoundedWorkerPool::new(
                "summarize",
                config.summarize.max_concurrent as usize,
            ),
            fetch_limiter: RateLimiter::new(config.fetch.rate_limit),
            summarize_limiter: RateLimiter::new(config.llm.rate_limit),
            fetch_retry: RetryPolicy::new(
                config.fetch.retry_attempts,
                Duration::from_millis(config.fetch.retry_delay_ms),
                Duration::from_secs(config.summarize.rate_limit_cooldown_secs),
            ),
            summarize_retry: RetryPolicy::new(
                config.summarize.retry_attempts,
                Duration::from_millis(config.summarize.retry_delay_ms),
                Duration::from_secs(config.summarize.rate_limit_cooldown_secs),
            ),
            cancel: cancel.clone(),
            // Rough bytes-per-token headroom before the summarizer's own cap
            extract_budget: config.llm.max_tokens as usize * 4,
        });

        Self {
            config,
            checkpoint,
            pipeline,
            cancel,
            mode,
            state: std::sync::Mutex::new(EngineState::Idle),
        }
    }

    /// Token external signal handlers can cancel to request a graceful stop
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> EngineState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: EngineState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    /// Runs the pipeline over `root` to completion, halt, or cancellation
    pub async fn run(&self, root: &BookmarkFolder) -> crate::Result<RunOutcome> {
        self.set_state(EngineState::Running);

        let total = root.count_bookmarks() as u64;
        self.checkpoint.init_statistics(total);
        tracing::info!("Starting run over {} bookmarks ({:?} mode)", total, self.mode);

        let processed_before = self.checkpoint.processed_urls();
        let failed_before = self.checkpoint.failed_urls();
        let recheck_universe = match self.mode {
            RunMode::RecheckFailed => Some(self.checkpoint.recheck_universe()),
            _ => None,
        };

        let cursor = match (self.mode, self.checkpoint.position()) {
            (RunMode::Resume, Some(position)) => TraversalCursor::resume(root, &position),
            _ => TraversalCursor::new(root),
        };

        let max_in_flight = (self.config.fetch.max_concurrent
            + self.config.summarize.pipeline_buffer) as usize;
        let save_interval = self.config.output.save_interval as u64;

        let mut outcome = RunOutcome::default();

        // The skipped count is derived from the whole tree, not from what the
        // cursor happens to emit: position-based resume elides items before
        // the saved position, and those must still be reported as skipped.
        let tree_urls: HashSet<String> = TraversalCursor::new(root)
            .map(|item| item.url().to_string())
            .collect();
        outcome.skipped = match &recheck_universe {
            Some(universe) => tree_urls.iter().filter(|u| !universe.contains(*u)).count() as u64,
            None => tree_urls
                .iter()
                .filter(|u| processed_before.contains(*u))
                .count() as u64,
        };
        self.checkpoint.add_skipped(outcome.skipped);

        let mut tasks: JoinSet<(u64, WorkItem, ItemOutcome)> = JoinSet::new();
        // Admission order of unfinished items; the resume position is always
        // the earliest admitted item that has no recorded outcome yet, so an
        // interrupt never strands an unrecorded item behind the position.
        let mut in_flight: BTreeMap<u64, WorkItem> = BTreeMap::new();
        let mut scheduled: HashSet<String> = HashSet::new();
        let mut seq: u64 = 0;
        let mut since_flush: u64 = 0;
        let mut halted: Option<String> = None;

        for item in cursor {
            if self.cancel.is_cancelled() || halted.is_some() {
                break;
            }

            let url = item.url().to_string();

            // Never the same URL twice in one run
            if !scheduled.insert(url.clone()) {
                continue;
            }

            let skip = match &recheck_universe {
                // Recheck runs touch only the failed universe
                Some(universe) => !universe.contains(&url),
                // Resume retries failures but skips completed items; a fresh
                // run has an empty checkpoint, so nothing matches.
                None => processed_before.contains(&url),
            };
            if skip {
                continue;
            }

            if self.mode == RunMode::Resume && failed_before.contains(&url) {
                tracing::debug!("Retrying previously failed URL {}", url);
            }

            // Backpressure: admit only while under the pipeline bound
            while tasks.len() >= max_in_flight {
                if let Some(joined) = tasks.join_next().await {
                    self.handle_completion(
                        joined,
                        &mut in_flight,
                        &mut outcome,
                        &mut since_flush,
                        save_interval,
                        &mut halted,
                    );
                } else {
                    break;
                }
            }
            if self.cancel.is_cancelled() || halted.is_some() {
                break;
            }

            in_flight.insert(seq, item.clone());
            let pipeline = Arc::clone(&self.pipeline);
            let task_seq = seq;
            seq += 1;
            tasks.spawn(async move {
                let result = pipeline.process(&item).await;
                (task_seq, item, result)
            });
        }

        // Drain whatever is still in flight; cancellation interrupts the
        // retry loops inside each task, so this terminates promptly.
        while let Some(joined) = tasks.join_next().await {
            self.handle_completion(
                joined,
                &mut in_flight,
                &mut outcome,
                &mut since_flush,
                save_interval,
                &mut halted,
            );
        }

        outcome.interrupted = self.cancel.is_cancelled();

        // Final flush regardless of cadence; a halt keeps the earlier error
        let final_flush = self.checkpoint.flush();

        if let Some(message) = halted {
            self.set_state(EngineState::Halted);
            return Err(ExportError::Halted(message));
        }
        final_flush?;

        self.set_state(EngineState::Completed);
        tracing::info!(
            "Run finished: {} processed, {} failed, {} skipped{}",
            outcome.processed,
            outcome.failed,
            outcome.skipped,
            if outcome.interrupted {
                " (interrupted)"
            } else {
                ""
            }
        );

        Ok(outcome)
    }

    #[allow(clippy::too_many_arguments)]
    fn handle_completion(
        &self,
        joined: Result<(u64, WorkItem, ItemOutcome), tokio::task::JoinError>,
        in_flight: &mut BTreeMap<u64, WorkItem>,
        outcome: &mut RunOutcome,
        since_flush: &mut u64,
        save_interval: u64,
        halted: &mut Option<String>,
    ) {
        let (task_seq, item, result) = match joined {
            Ok(tuple) => tuple,
            Err(e) => {
                // A panicking task loses its WorkItem; log and move on
                tracing::error!("Pipeline task panicked: {e}");
                return;
            }
        };

        match result {
            ItemOutcome::Success { output_path } => {
                tracing::info!("Processed {}", item.url());
                self.checkpoint.record_success(&item, Some(output_path));
                outcome.processed += 1;
            }
            ItemOutcome::Failure { error } => {
                tracing::warn!("Failed {}: {}", item.url(), error);
                self.checkpoint.record_failure(&item, &error);
                outcome.failed += 1;
            }
            ItemOutcome::Cancelled => {
                // No outcome recorded. The item stays in the admission map,
                // pinning the saved position at or before it so the next run
                // re-emits and re-processes it.
                tracing::debug!("Cancelled before completion: {}", item.url());
                return;
            }
        }

        in_flight.remove(&task_seq);

        // Advance the saved position to the earliest item still unresolved,
        // or to the item just finished when nothing older is pending.
        let position_item = in_flight.values().next().unwrap_or(&item);
        self.checkpoint.mark_position(position_item);

        *since_flush += 1;
        if *since_flush >= save_interval {
            *since_flush = 0;
            if let Err(e) = self.checkpoint.flush() {
                // Losing the ability to persist progress is the one per-item
                // condition that stops the run.
                tracing::error!("Checkpoint flush failed, halting: {e}");
                *halted = Some(format!("checkpoint flush failed: {e}"));
                self.cancel.cancel();
            }
        }
    }
}
