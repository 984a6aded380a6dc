//! The ride lifecycle worker (C5): per-ride state machine REQUESTED →
//! ASSIGNED → EN_ROUTE → COMPLETED/EXPIRED, retry loop, simulated trip
//! duration.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::busyset::BusySet;
use crate::error::Result;
use crate::matcher::Matcher;
use crate::model::{calculate_fare, RideSeed};
use crate::repo::RideStore;

pub struct WorkerConfig {
    pub max_wait_seconds: u64,
    pub simulation_speedup: f64,
    pub min_sim_duration_sec: f64,
}

pub struct RideWorker<S, B> {
    store: Arc<S>,
    busy_set: Arc<B>,
    matcher: Arc<Matcher<S, B>>,
    config: Arc<WorkerConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Expired,
}

impl<S, B> RideWorker<S, B>
where
    S: RideStore,
    B: BusySet,
{
    pub fn new(
        store: Arc<S>,
        busy_set: Arc<B>,
        matcher: Arc<Matcher<S, B>>,
        config: Arc<WorkerConfig>,
    ) -> Self {
        Self {
            store,
            busy_set,
            matcher,
            config,
        }
    }

    /// Drives `seed` through its full lifecycle. Returns the terminal
    /// outcome, or an error if an uncaught failure occurred (the ride may be
    /// left in its last committed state, per the error design). `cancel`
    /// is checked at both suspension points: while waiting out the match
    /// backoff it causes an immediate expiry, and while en route it cuts
    /// the simulated trip short so the worker still finishes its current
    /// state transition instead of being aborted mid-flight.
    #[instrument(skip(self, seed, cancel), fields(ride_id = %seed.ride_id))]
    pub async fn run(&self, seed: RideSeed, cancel: &CancellationToken) -> Result<Outcome> {
        let requested_at = crate::time::now();
        self.store.persist_requested(&seed, requested_at).await?;

        let t0 = crate::time::now();
        let driver_id = loop {
            let attempt = self
                .matcher
                .match_ride(seed.ride_id, seed.pickup_lon, seed.pickup_lat, t0)
                .await?;

            if let Some(driver_id) = attempt {
                break Some(driver_id);
            }

            let elapsed = (crate::time::now() - t0).num_seconds().max(0) as u64;
            if elapsed >= self.config.max_wait_seconds || cancel.is_cancelled() {
                self.store.expire_if_unmatched(seed.ride_id).await?;
                break None;
            }

            self.store.record_match_miss(seed.ride_id).await?;

            let backoff_ms = rand::rng().random_range(800..=1300);
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(backoff_ms)) => {}
                _ = cancel.cancelled() => {}
            }
        };

        let Some(driver_id) = driver_id else {
            return Ok(Outcome::Expired);
        };

        // `try_assign` already moved the ride to ASSIGNED inside the
        // matcher's transaction; the worker now owns the handoff to EN_ROUTE.
        if let Err(e) = self.store.begin_en_route(seed.ride_id, driver_id).await {
            self.busy_set.release(driver_id).await?;
            return Err(e);
        }

        let simulated = (seed.trip_duration_sec / self.config.simulation_speedup)
            .max(self.config.min_sim_duration_sec);
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs_f64(simulated)) => {}
            _ = cancel.cancelled() => {}
        }

        let fare = calculate_fare(seed.trip_distance_km);
        let completed_at = crate::time::now();

        let complete_result = self
            .store
            .complete(
                seed.ride_id,
                driver_id,
                seed.dropoff_lon,
                seed.dropoff_lat,
                seed.trip_distance_km,
                fare,
                completed_at,
            )
            .await;

        self.busy_set.release(driver_id).await?;
        complete_result?;

        Ok(Outcome::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::busyset::InMemoryBusySet;
    use crate::model::{Driver, DriverStatus, Ride};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    struct FakeStore {
        driver: Driver,
        completes: AtomicUsize,
        misses: AtomicUsize,
        expires: AtomicUsize,
    }

    #[async_trait]
    impl RideStore for FakeStore {
        async fn persist_requested(&self, _seed: &RideSeed, _requested_at: DateTime<Utc>) -> Result<()> {
            Ok(())
        }

        async fn candidate_drivers(
            &self,
            _region: Option<i32>,
            exclude: &[Uuid],
            _limit: usize,
        ) -> Result<Vec<Driver>> {
            if exclude.contains(&self.driver.driver_id) {
                Ok(vec![])
            } else {
                Ok(vec![self.driver.clone()])
            }
        }

        async fn try_assign(
            &self,
            _ride_id: Uuid,
            _driver_id: Uuid,
            _pickup_lon: f64,
            _pickup_lat: f64,
            _match_latency_ms: i64,
        ) -> Result<bool> {
            Ok(true)
        }

        async fn record_match_miss(&self, _ride_id: Uuid) -> Result<()> {
            self.misses.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        async fn expire_if_unmatched(&self, _ride_id: Uuid) -> Result<()> {
            self.expires.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        async fn begin_en_route(&self, _ride_id: Uuid, _driver_id: Uuid) -> Result<()> {
            Ok(())
        }

        async fn complete(
            &self,
            _ride_id: Uuid,
            _driver_id: Uuid,
            _dropoff_lon: f64,
            _dropoff_lat: f64,
            _distance_km: f64,
            _fare_amount: f64,
            _completed_at: DateTime<Utc>,
        ) -> Result<()> {
            self.completes.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        async fn get_ride(&self, _ride_id: Uuid) -> Result<Option<Ride>> {
            Ok(None)
        }
    }

    fn seed() -> RideSeed {
        RideSeed {
            ride_id: Uuid::new_v4(),
            pickup_lon: -73.98,
            pickup_lat: 40.75,
            dropoff_lon: -73.96,
            dropoff_lat: 40.76,
            trip_distance_km: 1.77,
            trip_duration_sec: 2.0,
            fare_amount: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn completes_when_a_driver_is_available() {
        let driver = Driver {
            driver_id: Uuid::new_v4(),
            status: DriverStatus::Available,
            lon: -73.99,
            lat: 40.74,
        };
        let store = Arc::new(FakeStore {
            driver,
            completes: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
            expires: AtomicUsize::new(0),
        });
        let busy_set = Arc::new(InMemoryBusySet::new());
        let matcher = Arc::new(Matcher::new(store.clone(), busy_set.clone(), 5));
        let config = Arc::new(WorkerConfig {
            max_wait_seconds: 300,
            simulation_speedup: 30.0,
            min_sim_duration_sec: 2.0,
        });
        let worker = RideWorker::new(store.clone(), busy_set.clone(), matcher, config);

        let cancel = CancellationToken::new();
        let outcome = worker.run(seed(), &cancel).await.unwrap();

        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(store.completes.load(Ordering::Relaxed), 1);
        assert!(busy_set.members().await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn expires_with_no_drivers() {
        let driver = Driver {
            driver_id: Uuid::new_v4(),
            status: DriverStatus::Available,
            lon: -73.99,
            lat: 40.74,
        };
        let store = Arc::new(FakeStore {
            driver,
            completes: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
            expires: AtomicUsize::new(0),
        });
        // pre-hold the only driver so the matcher never succeeds
        let busy_set = Arc::new(InMemoryBusySet::new());
        busy_set.try_acquire(store.driver.driver_id).await.unwrap();
        let matcher = Arc::new(Matcher::new(store.clone(), busy_set.clone(), 5));
        let config = Arc::new(WorkerConfig {
            max_wait_seconds: 1,
            simulation_speedup: 30.0,
            min_sim_duration_sec: 2.0,
        });
        let worker = RideWorker::new(store.clone(), busy_set, matcher, config);

        let cancel = CancellationToken::new();
        let outcome = worker.run(seed(), &cancel).await.unwrap();

        assert_eq!(outcome, Outcome::Expired);
        assert_eq!(store.completes.load(Ordering::Relaxed), 0);
        assert!(store.expires.load(Ordering::Relaxed) >= 1);
    }
}
