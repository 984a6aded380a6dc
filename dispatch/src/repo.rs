//! Persistence traits. Mirrors the teacher's `SessionRepository` split: the
//! matcher, worker, replay scheduler, and metrics reader are written against
//! these traits so their logic can be unit-tested against in-memory fakes
//! without a live Postgres connection.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::model::{Driver, DriverCandidate, Ride, RideSeed, TripRecord};

/// Ride-table operations used by the matcher and the ride lifecycle worker.
#[async_trait]
pub trait RideStore: Send + Sync {
    /// `INSERT … ON CONFLICT(ride_id) DO UPDATE` to (re)enter REQUESTED.
    async fn persist_requested(&self, seed: &RideSeed, requested_at: DateTime<Utc>)
    -> Result<()>;

    /// Candidate AVAILABLE drivers, optionally restricted to `region`,
    /// excluding `exclude`, capped at `limit`, randomly ordered.
    async fn candidate_drivers(
        &self,
        region: Option<i32>,
        exclude: &[Uuid],
        limit: usize,
    ) -> Result<Vec<Driver>>;

    /// Row-locks `driver_id`, and if it is AVAILABLE, sets it MATCHING at
    /// `pickup` and assigns `ride_id` with `match_latency_ms`, all inside one
    /// serializable transaction. Returns `true` iff the assignment happened.
    async fn try_assign(
        &self,
        ride_id: Uuid,
        driver_id: Uuid,
        pickup_lon: f64,
        pickup_lat: f64,
        match_latency_ms: i64,
    ) -> Result<bool>;

    /// Increments `retries` while `assigned_driver IS NULL AND status='REQUESTED'`.
    async fn record_match_miss(&self, ride_id: Uuid) -> Result<()>;

    /// Sets `status='EXPIRED'` conditional on `assigned_driver IS NULL AND
    /// status='REQUESTED'`.
    async fn expire_if_unmatched(&self, ride_id: Uuid) -> Result<()>;

    /// Sets `status='EN_ROUTE'` and marks the assigned driver EN_ROUTE.
    async fn begin_en_route(&self, ride_id: Uuid, driver_id: Uuid) -> Result<()>;

    /// Inserts the trip (idempotent), marks the ride COMPLETED, and returns
    /// the driver to AVAILABLE at `dropoff`, all inside one transaction.
    async fn complete(
        &self,
        ride_id: Uuid,
        driver_id: Uuid,
        dropoff_lon: f64,
        dropoff_lat: f64,
        distance_km: f64,
        fare_amount: f64,
        completed_at: DateTime<Utc>,
    ) -> Result<()>;

    async fn get_ride(&self, ride_id: Uuid) -> Result<Option<Ride>>;
}

/// Driver-table operations used at startup reconciliation and by the
/// candidate-ranking step of the matcher.
#[async_trait]
pub trait DriverRepo: Send + Sync {
    /// All driver IDs whose store status is not AVAILABLE, for `reset_to`.
    async fn non_available_driver_ids(&self) -> Result<Vec<Uuid>>;
}

/// Ranks candidates by great-circle distance to `pickup`, keeping the top-K.
/// Pure function, not a store operation, but lives alongside the traits
/// since it operates on `DriverCandidate` values the store traits produce.
pub fn rank_candidates(
    drivers: &[Driver],
    pickup_lon: f64,
    pickup_lat: f64,
    top_k: usize,
) -> Vec<DriverCandidate> {
    let mut ranked: Vec<DriverCandidate> = drivers
        .iter()
        .map(|d| DriverCandidate {
            driver_id: d.driver_id,
            distance_km: crate::geo::haversine(pickup_lon, pickup_lat, d.lon, d.lat),
        })
        .collect();

    ranked.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    ranked.truncate(top_k);
    ranked
}

/// Seed-table read side, used by the replay scheduler.
#[async_trait]
pub trait SeedRepo: Send + Sync {
    async fn read_seeds(&self, limit: usize) -> Result<Vec<RideSeed>>;
}

/// Read-side aggregations backing the metrics endpoint.
#[async_trait]
pub trait MetricsRepo: Send + Sync {
    async fn status_counts(&self) -> Result<Vec<(String, i64)>>;
    async fn completed_count(&self) -> Result<i64>;
    async fn avg_match_latency_ms(&self) -> Result<Option<f64>>;
    async fn total_retries(&self) -> Result<i64>;
    async fn driver_status_histogram(&self) -> Result<Vec<(String, i64)>>;
    async fn recent_drivers(&self, limit: i64) -> Result<Vec<Driver>>;
    async fn recent_rides(&self, limit: i64) -> Result<Vec<Ride>>;
    async fn recent_trips(&self, limit: i64) -> Result<Vec<TripRecord>>;
}

/// Opaque key/value baseline store backing the delta-throughput computation.
/// Redis doubles as this in production (same connection as the busy-set,
/// different keys); tests use an in-memory fake.
#[async_trait]
pub trait MetricsBaseline: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
}
