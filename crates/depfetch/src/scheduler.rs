//! Bounded-parallelism download scheduling
//!
//! Runs cache lookups on a fixed number of scoped worker threads fed from a
//! shared queue. Every job runs to completion independently; a failed job
//! never cancels the others.

use crate::cache::{ArtifactCache, CacheError, CachePolicy};
use crossbeam::channel;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::debug;
use url::Url;

/// Default number of concurrent fetches
pub const DEFAULT_PARALLELISM: usize = 6;

/// Caller-side cancellation flag
///
/// Once triggered, queued jobs are skipped; jobs already running finish.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-URL outcome of `fetch_all`
pub type FetchReport = BTreeMap<Url, Result<PathBuf, CacheError>>;

/// Worker pool over an artifact cache
#[derive(Debug, Clone)]
pub struct DownloadScheduler {
    cache: Arc<ArtifactCache>,
    parallelism: usize,
    abort: AbortHandle,
}

impl DownloadScheduler {
    pub fn new(cache: Arc<ArtifactCache>, parallelism: usize) -> Self {
        Self {
            cache,
            parallelism: parallelism.max(1),
            abort: AbortHandle::new(),
        }
    }

    pub fn with_abort_handle(mut self, abort: AbortHandle) -> Self {
        self.abort = abort;
        self
    }

    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    pub fn cache(&self) -> &Arc<ArtifactCache> {
        &self.cache
    }

    /// Fetch every URL through the cache, at most `parallelism` at a time
    ///
    /// Duplicate URLs are fetched once. URLs skipped because of an abort are
    /// missing from the report.
    pub fn fetch_all(&self, urls: &[Url], policy: CachePolicy) -> FetchReport {
        let unique: Vec<Url> = urls.iter().cloned().collect::<BTreeSet<_>>().into_iter().collect();
        debug!(count = unique.len(), parallelism = self.parallelism, "fetching");

        let results = self.run(unique.clone(), |url| self.cache.get(&url, policy));

        unique
            .into_iter()
            .zip(results)
            .filter_map(|(url, result)| result.map(|r| (url, r)))
            .collect()
    }

    /// Apply `job` to every item on the worker pool
    ///
    /// The output is aligned with the input; `None` marks a job skipped
    /// after an abort.
    pub fn run<T, R, F>(&self, items: Vec<T>, job: F) -> Vec<Option<R>>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Sync,
    {
        let count = items.len();
        if count == 0 {
            return Vec::new();
        }

        let (job_tx, job_rx) = channel::unbounded();
        for item in items.into_iter().enumerate() {
            // The receiver outlives this loop, so sending cannot fail
            let _ = job_tx.send(item);
        }
        drop(job_tx);

        let (result_tx, result_rx) = channel::unbounded();
        let workers = self.parallelism.min(count);

        thread::scope(|scope| {
            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                let job = &job;
                let abort = &self.abort;
                scope.spawn(move || {
                    for (index, item) in job_rx.iter() {
                        if abort.is_aborted() {
                            continue;
                        }
                        let _ = result_tx.send((index, job(item)));
                    }
                });
            }
        });
        drop(result_tx);

        let mut results: Vec<Option<R>> = (0..count).map(|_| None).collect();
        for (index, result) in result_rx.try_iter() {
            results[index] = Some(result);
        }
        results
    }
}
