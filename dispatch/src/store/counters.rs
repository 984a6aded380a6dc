use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Process-wide `run_txn` diagnostics. Readable and resettable, never
/// affecting control flow. Mirrors the teacher's `metrics::counters::Counters`.
#[derive(Clone, Default)]
pub struct GatewayCounters {
    pub total_retries: Arc<AtomicU64>,
    pub successful_after_retry: Arc<AtomicU64>,
    pub failed_after_max_retries: Arc<AtomicU64>,
    conflicts_by_attempt: Arc<Mutex<HashMap<u32, u64>>>,
}

impl GatewayCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_conflict(&self, attempt: u32) {
        self.total_retries.fetch_add(1, Ordering::Relaxed);
        let mut map = self.conflicts_by_attempt.lock().unwrap();
        *map.entry(attempt).or_insert(0) += 1;
    }

    pub fn record_success(&self, attempts_used: u32) {
        if attempts_used > 0 {
            self.successful_after_retry.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_exhausted(&self) {
        self.failed_after_max_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn conflicts_by_attempt(&self) -> HashMap<u32, u64> {
        self.conflicts_by_attempt.lock().unwrap().clone()
    }

    pub fn reset(&self) {
        self.total_retries.store(0, Ordering::Relaxed);
        self.successful_after_retry.store(0, Ordering::Relaxed);
        self.failed_after_max_retries.store(0, Ordering::Relaxed);
        self.conflicts_by_attempt.lock().unwrap().clear();
    }
}
