//! Multi-target coordinator
//!
//! [`NewsPool`] runs the download phase of several sources (or single
//! articles) side by side on a [`WorkerPool`] and hands every target back in
//! the order it was given.

use super::worker::WorkerPool;
use crate::config::LanePolicy;
use crate::crawler::Crawler;
use crate::executor::run_as_sync;
use crate::model::CrawlTarget;
use crate::{NewzError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// How a batch will be spread over lanes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LanePlan {
    /// Concurrent workers
    pub lanes: usize,
    /// Work items, one per target
    pub jobs: usize,
    pub policy: LanePolicy,
}

/// Decides how many lanes a batch gets
///
/// `override_threads` always wins. Otherwise a batch made only of sources gets
/// `threads_per_source` lanes per source, so load spreads across hosts; any
/// batch containing a bare article runs on a single lane.
pub fn plan_lanes(
    targets: &[CrawlTarget],
    threads_per_source: usize,
    override_threads: Option<usize>,
) -> usize {
    if let Some(threads) = override_threads {
        return threads.max(1);
    }

    if !targets.is_empty() && targets.iter().all(CrawlTarget::is_source) {
        threads_per_source.max(1) * targets.len()
    } else {
        1
    }
}

type Slots = Arc<Mutex<Vec<Option<CrawlTarget>>>>;

struct Batch {
    pool: Arc<WorkerPool>,
    slots: Slots,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Runs batches of crawl targets across lanes
#[derive(Debug)]
pub struct NewsPool {
    crawler: Crawler,
    policy: LanePolicy,
    batch: Mutex<Option<Batch>>,
    joining: AtomicBool,
}

impl std::fmt::Debug for Batch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Batch").field("pool", &self.pool).finish()
    }
}

impl NewsPool {
    /// Creates a coordinator using the lane policy from the crawler's config
    pub fn new(crawler: Crawler) -> Self {
        let policy = crawler.config().pool.lane_policy;
        Self::with_policy(crawler, policy)
    }

    pub fn with_policy(crawler: Crawler, policy: LanePolicy) -> Self {
        Self {
            crawler,
            policy,
            batch: Mutex::new(None),
            joining: AtomicBool::new(false),
        }
    }

    pub fn policy(&self) -> LanePolicy {
        self.policy
    }

    /// Plans lanes for `targets` and submits one work item per target
    ///
    /// A source runs its article download phase with `[crawler]
    /// article-threads` fetches in flight; a bare article runs its own
    /// download. Fails with [`NewzError::Concurrency`] while a batch is still
    /// waiting to be joined.
    pub fn set(
        &self,
        targets: Vec<CrawlTarget>,
        threads_per_source: usize,
        override_threads: Option<usize>,
    ) -> Result<LanePlan> {
        let mut batch = lock(&self.batch);
        if batch.is_some() || self.joining.load(Ordering::SeqCst) {
            return Err(NewzError::Concurrency(
                "a batch is already set; join it before setting another".to_string(),
            ));
        }

        let plan = LanePlan {
            lanes: plan_lanes(&targets, threads_per_source, override_threads),
            jobs: targets.len(),
            policy: self.policy,
        };

        let pool = Arc::new(WorkerPool::new(
            plan.lanes,
            targets.len(),
            self.crawler.config().pool.idle_timeout(),
            self.policy,
        ));
        let slots: Slots = Arc::new(Mutex::new((0..targets.len()).map(|_| None).collect()));

        for (index, target) in targets.into_iter().enumerate() {
            let crawler = match self.policy {
                LanePolicy::Shared => self.crawler.clone(),
                LanePolicy::Isolated => self.crawler.for_isolated_lane()?,
            };
            let slots = slots.clone();

            if let Err(e) = pool.submit(move || async move {
                let (target, result) = run_target(&crawler, target).await;
                lock(&slots)[index] = Some(target);
                result
            }) {
                pool.abandon();
                return Err(e);
            }
        }

        tracing::info!(
            lanes = plan.lanes,
            jobs = plan.jobs,
            policy = ?plan.policy,
            "Planned crawl lanes"
        );
        *batch = Some(Batch { pool, slots });
        Ok(plan)
    }

    /// Waits for every job of the current batch and returns the targets in input order
    ///
    /// Fails with [`NewzError::Concurrency`] when nothing was set or another
    /// join is running. A target whose job panicked is not returned. Dropping
    /// the future before it finishes abandons queued jobs and clears the batch.
    pub async fn join_async(&self) -> Result<Vec<CrawlTarget>> {
        if self
            .joining
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(NewzError::Concurrency(
                "a join is already running".to_string(),
            ));
        }
        let mut guard = JoinGuard {
            pool: self,
            finished: false,
        };

        let (pool, slots) = match lock(&self.batch).as_ref() {
            Some(batch) => (batch.pool.clone(), batch.slots.clone()),
            None => {
                guard.finished = true;
                return Err(NewzError::Concurrency(
                    "nothing to join; call set first".to_string(),
                ));
            }
        };

        let report = pool.wait_completion().await?;
        lock(&self.batch).take();
        guard.finished = true;

        let slots = std::mem::take(&mut *lock(&slots));
        let expected = slots.len();
        let targets: Vec<CrawlTarget> = slots.into_iter().flatten().collect();
        if targets.len() < expected {
            tracing::error!(
                lost = expected - targets.len(),
                "Some jobs panicked; their targets were not returned"
            );
        }

        tracing::info!(
            completed = report.completed,
            failed = report.failed,
            "Joined crawl lanes"
        );
        Ok(targets)
    }

    /// Blocking form of [`join_async`](Self::join_async)
    pub fn join(&self) -> Result<Vec<CrawlTarget>> {
        run_as_sync(self.join_async())?
    }
}

struct JoinGuard<'a> {
    pool: &'a NewsPool,
    finished: bool,
}

impl Drop for JoinGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            if let Some(batch) = lock(&self.pool.batch).take() {
                batch.pool.abandon();
                tracing::warn!("Join cancelled; queued jobs abandoned");
            }
        }
        self.pool.joining.store(false, Ordering::SeqCst);
    }
}

async fn run_target(crawler: &Crawler, target: CrawlTarget) -> (CrawlTarget, Result<()>) {
    match target {
        CrawlTarget::Source(mut source) => {
            let threads = crawler.config().crawler.article_threads;
            let result = crawler
                .download_articles(&mut source, threads)
                .await
                .map(|summary| {
                    tracing::debug!(
                        source = %source.url,
                        downloaded = summary.downloaded,
                        failed = summary.failed_urls.len(),
                        "Lane finished source"
                    );
                });
            (CrawlTarget::Source(source), result)
        }
        CrawlTarget::Article(mut article) => {
            let result = crawler.download_article(&mut article).await;
            (CrawlTarget::Article(article), result)
        }
    }
}
