//! The replay scheduler (C6): reads ride seeds, spawns a bounded worker
//! pool, awaits completion, aggregates diagnostics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::busyset::BusySet;
use crate::matcher::Matcher;
use crate::repo::{RideStore, SeedRepo};
use crate::store::GatewayCounters;
use crate::worker::{Outcome, RideWorker, WorkerConfig};

#[derive(Default, Debug, Clone, Copy)]
pub struct ReplaySummary {
    pub completed: u64,
    pub expired: u64,
    pub failed: u64,
}

pub struct ReplayScheduler<Seeds, S, B> {
    seeds: Arc<Seeds>,
    store: Arc<S>,
    busy_set: Arc<B>,
    matcher: Arc<Matcher<S, B>>,
    worker_config: Arc<WorkerConfig>,
    max_concurrency: usize,
}

impl<Seeds, S, B> ReplayScheduler<Seeds, S, B>
where
    Seeds: SeedRepo + 'static,
    S: RideStore + 'static,
    B: BusySet + 'static,
{
    pub fn new(
        seeds: Arc<Seeds>,
        store: Arc<S>,
        busy_set: Arc<B>,
        matcher: Arc<Matcher<S, B>>,
        worker_config: Arc<WorkerConfig>,
        max_concurrency: usize,
    ) -> Self {
        Self {
            seeds,
            store,
            busy_set,
            matcher,
            worker_config,
            max_concurrency,
        }
    }

    /// Runs `limit` ride seeds through the worker pool, respecting
    /// `max_concurrency`, and returns a summary. Honors `cancel`: once
    /// cancelled, no new workers are spawned and outstanding ones are
    /// awaited to completion (they always finish their current state
    /// transition and release any held busy-set entry before returning).
    pub async fn replay(
        &self,
        limit: usize,
        gateway_counters: &GatewayCounters,
        cancel: CancellationToken,
    ) -> crate::error::Result<ReplaySummary> {
        let seeds = self.seeds.read_seeds(limit).await?;
        info!(count = seeds.len(), "loaded ride seeds");

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let completed = Arc::new(AtomicU64::new(0));
        let expired = Arc::new(AtomicU64::new(0));
        let failed = Arc::new(AtomicU64::new(0));

        let mut set = JoinSet::new();

        for seed in seeds {
            if cancel.is_cancelled() {
                break;
            }

            let permit = semaphore.clone().acquire_owned().await.expect("semaphore open");
            let store = self.store.clone();
            let busy_set = self.busy_set.clone();
            let matcher = self.matcher.clone();
            let config = self.worker_config.clone();
            let completed = completed.clone();
            let expired = expired.clone();
            let failed = failed.clone();
            let worker_cancel = cancel.clone();

            set.spawn(async move {
                let worker = RideWorker::new(store, busy_set, matcher, config);
                let ride_id = seed.ride_id;
                let result = worker.run(seed, &worker_cancel).await;
                drop(permit);

                match result {
                    Ok(Outcome::Completed) => {
                        completed.fetch_add(1, Ordering::Relaxed);
                    }
                    Ok(Outcome::Expired) => {
                        expired.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        warn!(ride_id = %ride_id, error = %e, "ride worker failed");
                        failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            });
        }

        while set.join_next().await.is_some() {}

        let summary = ReplaySummary {
            completed: completed.load(Ordering::Relaxed),
            expired: expired.load(Ordering::Relaxed),
            failed: failed.load(Ordering::Relaxed),
        };

        info!(
            completed = summary.completed,
            expired = summary.expired,
            failed = summary.failed,
            total_retries = gateway_counters.total_retries.load(Ordering::Relaxed),
            "replay complete"
        );

        Ok(summary)
    }
}
