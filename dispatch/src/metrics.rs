//! The metrics read-side (C7): stateless aggregations plus a delta-based
//! throughput computation persisted against an external key/value baseline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::repo::{MetricsBaseline, MetricsRepo};

const THROUGHPUT_BASELINE_KEY: &str = "metrics:throughput_baseline";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Baseline {
    completed: i64,
    sampled_at_ms: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub status_counts: Vec<(String, i64)>,
    pub completed: i64,
    pub avg_match_latency_ms: Option<f64>,
    pub total_retries: i64,
    pub completion_rate: f64,
    pub throughput_per_min: f64,
    pub driver_status_histogram: Vec<(String, i64)>,
    /// Only reported when the store exposes a per-node commit-latency
    /// metric; `None` otherwise (see spec's `consistency_delay_ms`).
    pub consistency_delay_ms: Option<f64>,
}

pub struct MetricsReader<M, K> {
    repo: M,
    baseline: K,
}

impl<M, K> MetricsReader<M, K>
where
    M: MetricsRepo,
    K: MetricsBaseline,
{
    pub fn new(repo: M, baseline: K) -> Self {
        Self { repo, baseline }
    }

    /// Pass-throughs for the read-only HTTP surface's `/api/drivers` and
    /// `/api/rides` endpoints, which need raw rows rather than aggregates.
    pub async fn repo_recent_drivers(&self, limit: i64) -> Result<Vec<crate::model::Driver>> {
        self.repo.recent_drivers(limit).await
    }

    pub async fn repo_recent_rides(&self, limit: i64) -> Result<Vec<crate::model::Ride>> {
        self.repo.recent_rides(limit).await
    }

    pub async fn snapshot(&self) -> Result<MetricsSnapshot> {
        let status_counts = self.repo.status_counts().await?;
        let completed = self.repo.completed_count().await?;
        let avg_match_latency_ms = self.repo.avg_match_latency_ms().await?;
        let total_retries = self.repo.total_retries().await?;
        let driver_status_histogram = self.repo.driver_status_histogram().await?;

        let total_rides: i64 = status_counts.iter().map(|(_, n)| *n).sum();
        let completion_rate = if total_rides > 0 {
            completed as f64 / total_rides as f64
        } else {
            0.0
        };

        let throughput_per_min = self.throughput(completed, crate::time::now()).await?;

        Ok(MetricsSnapshot {
            status_counts,
            completed,
            avg_match_latency_ms,
            total_retries,
            completion_rate,
            throughput_per_min,
            driver_status_histogram,
            consistency_delay_ms: None,
        })
    }

    /// `throughput = max(0, (completed_now - completed_last) / (t_now -
    /// t_last)) * 60` rides/min. Guards against truncation (completed_now <
    /// completed_last resets the baseline and reports 0) and only advances
    /// the baseline when the delta is positive, to avoid noise between
    /// quiescent samples.
    async fn throughput(&self, completed_now: i64, now: DateTime<Utc>) -> Result<f64> {
        let raw = self.baseline.get(THROUGHPUT_BASELINE_KEY).await?;
        let prev: Option<Baseline> = raw.and_then(|s| serde_json::from_str(&s).ok());

        let Some(prev) = prev else {
            self.save_baseline(completed_now, now).await?;
            return Ok(0.0);
        };

        if completed_now < prev.completed {
            self.baseline.delete(THROUGHPUT_BASELINE_KEY).await?;
            self.save_baseline(completed_now, now).await?;
            return Ok(0.0);
        }

        let delta = completed_now - prev.completed;
        if delta <= 0 {
            return Ok(0.0);
        }

        let elapsed_sec = (now.timestamp_millis() - prev.sampled_at_ms) as f64 / 1000.0;
        let per_min = if elapsed_sec > 0.0 {
            (delta as f64 / elapsed_sec) * 60.0
        } else {
            0.0
        };

        self.save_baseline(completed_now, now).await?;
        Ok(per_min.max(0.0))
    }

    async fn save_baseline(&self, completed: i64, now: DateTime<Utc>) -> Result<()> {
        let baseline = Baseline {
            completed,
            sampled_at_ms: now.timestamp_millis(),
        };
        let encoded = serde_json::to_string(&baseline).expect("baseline always serializes");
        self.baseline.set(THROUGHPUT_BASELINE_KEY, &encoded).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Driver, Ride, TripRecord};
    use async_trait::async_trait;
    use chrono::Duration;
    use std::sync::Mutex;

    struct FakeRepo {
        completed: i64,
    }

    #[async_trait]
    impl MetricsRepo for FakeRepo {
        async fn status_counts(&self) -> Result<Vec<(String, i64)>> {
            Ok(vec![("COMPLETED".to_string(), self.completed)])
        }
        async fn completed_count(&self) -> Result<i64> {
            Ok(self.completed)
        }
        async fn avg_match_latency_ms(&self) -> Result<Option<f64>> {
            Ok(Some(120.0))
        }
        async fn total_retries(&self) -> Result<i64> {
            Ok(0)
        }
        async fn driver_status_histogram(&self) -> Result<Vec<(String, i64)>> {
            Ok(vec![])
        }
        async fn recent_drivers(&self, _limit: i64) -> Result<Vec<Driver>> {
            Ok(vec![])
        }
        async fn recent_rides(&self, _limit: i64) -> Result<Vec<Ride>> {
            Ok(vec![])
        }
        async fn recent_trips(&self, _limit: i64) -> Result<Vec<TripRecord>> {
            Ok(vec![])
        }
    }

    #[derive(Default)]
    struct FakeBaseline {
        store: Mutex<Option<String>>,
    }

    #[async_trait]
    impl MetricsBaseline for FakeBaseline {
        async fn get(&self, _key: &str) -> Result<Option<String>> {
            Ok(self.store.lock().unwrap().clone())
        }
        async fn set(&self, _key: &str, value: &str) -> Result<()> {
            *self.store.lock().unwrap() = Some(value.to_string());
            Ok(())
        }
        async fn delete(&self, _key: &str) -> Result<()> {
            *self.store.lock().unwrap() = None;
            Ok(())
        }
    }

    #[tokio::test]
    async fn first_sample_reports_zero_throughput() {
        let reader = MetricsReader::new(FakeRepo { completed: 100 }, FakeBaseline::default());
        let t = crate::time::now();
        assert_eq!(reader.throughput(100, t).await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn positive_delta_computes_rate() {
        let baseline = FakeBaseline::default();
        let reader = MetricsReader::new(FakeRepo { completed: 100 }, baseline);
        let t0 = crate::time::now();
        reader.throughput(100, t0).await.unwrap();

        let t1 = t0 + Duration::seconds(60);
        let rate = reader.throughput(160, t1).await.unwrap();
        assert!((rate - 60.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn truncation_resets_baseline_to_zero() {
        let baseline = FakeBaseline::default();
        let reader = MetricsReader::new(FakeRepo { completed: 100 }, baseline);
        let t0 = crate::time::now();
        reader.throughput(100, t0).await.unwrap();

        let t1 = t0 + Duration::seconds(10);
        let rate = reader.throughput(0, t1).await.unwrap();
        assert_eq!(rate, 0.0);

        let t2 = t1 + Duration::seconds(60);
        let rate2 = reader.throughput(60, t2).await.unwrap();
        assert!((rate2 - 60.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn quiescent_sample_does_not_advance_or_go_negative() {
        let baseline = FakeBaseline::default();
        let reader = MetricsReader::new(FakeRepo { completed: 100 }, baseline);
        let t0 = crate::time::now();
        reader.throughput(100, t0).await.unwrap();

        let t1 = t0 + Duration::seconds(5);
        let rate = reader.throughput(100, t1).await.unwrap();
        assert_eq!(rate, 0.0);
    }
}
