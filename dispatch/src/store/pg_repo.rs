//! Postgres-backed implementations of the persistence traits, built on the
//! gateway's `run_txn`/`pool()`. Mirrors the shape of the teacher's
//! `SqlxSessionRepository`: conditional `UPDATE … WHERE` clauses detect lost
//! races instead of raising.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use super::{boxed, Gateway};
use crate::error::{DispatchError, Result};
use crate::geo::region;
use crate::model::{Driver, DriverStatus, Ride, RideSeed, RideStatus, TripRecord};
use crate::repo::{DriverRepo, MetricsRepo, RideStore, SeedRepo};

/// `run_txn`'s retry cap used when a `PgRepo` is built without an explicit
/// config (e.g. in tests).
const DEFAULT_MAX_RETRIES: u32 = 5;

#[derive(Clone)]
pub struct PgRepo {
    gateway: Gateway,
    max_retries: u32,
}

impl PgRepo {
    pub fn new(gateway: Gateway) -> Self {
        Self {
            gateway,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Builds a `PgRepo` whose `run_txn` retry cap comes from
    /// `DispatchConfig::max_retries` instead of the built-in default.
    pub fn with_max_retries(gateway: Gateway, max_retries: u32) -> Self {
        Self {
            gateway,
            max_retries,
        }
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }
}

fn store_err(e: sqlx::Error) -> DispatchError {
    DispatchError::StoreUnavailable(e.into())
}

#[async_trait]
impl RideStore for PgRepo {
    async fn persist_requested(
        &self,
        seed: &RideSeed,
        requested_at: DateTime<Utc>,
    ) -> Result<()> {
        let region_id = region(Some(seed.pickup_lon), Some(seed.pickup_lat));
        let seed = seed.clone();

        self.gateway
            .run_txn(self.max_retries, move |conn| {
                let seed = seed.clone();
                boxed(async move {
                    sqlx::query(
                        r#"
                        INSERT INTO rides (
                            ride_id, requested_at, pickup_lon, pickup_lat,
                            dropoff_lon, dropoff_lat, passenger_count, region,
                            status, retries
                        )
                        VALUES ($1, $2, $3, $4, $5, $6, 1, $7, 'REQUESTED', 0)
                        ON CONFLICT (ride_id) DO UPDATE SET
                            status = 'REQUESTED',
                            requested_at = EXCLUDED.requested_at,
                            retries = 0
                        "#,
                    )
                    .bind(seed.ride_id)
                    .bind(requested_at)
                    .bind(seed.pickup_lon)
                    .bind(seed.pickup_lat)
                    .bind(seed.dropoff_lon)
                    .bind(seed.dropoff_lat)
                    .bind(region_id)
                    .execute(&mut *conn)
                    .await?;
                    Ok(())
                })
            })
            .await
    }

    async fn candidate_drivers(
        &self,
        region: Option<i32>,
        exclude: &[Uuid],
        limit: usize,
    ) -> Result<Vec<Driver>> {
        let limit = limit as i64;
        let rows = if let Some(region_id) = region {
            sqlx::query(
                r#"
                SELECT driver_id, current_lon, current_lat
                FROM drivers
                WHERE status = 'AVAILABLE'
                  AND region = $1
                  AND NOT (driver_id = ANY($2))
                ORDER BY random()
                LIMIT $3
                "#,
            )
            .bind(region_id)
            .bind(exclude)
            .bind(limit)
            .fetch_all(self.gateway.pool())
            .await
        } else {
            sqlx::query(
                r#"
                SELECT driver_id, current_lon, current_lat
                FROM drivers
                WHERE status = 'AVAILABLE'
                  AND NOT (driver_id = ANY($1))
                ORDER BY random()
                LIMIT $2
                "#,
            )
            .bind(exclude)
            .bind(limit)
            .fetch_all(self.gateway.pool())
            .await
        }
        .map_err(store_err)?;

        Ok(rows
            .into_iter()
            .map(|row| Driver {
                driver_id: row.get("driver_id"),
                status: DriverStatus::Available,
                lon: row.get("current_lon"),
                lat: row.get("current_lat"),
            })
            .collect())
    }

    async fn try_assign(
        &self,
        ride_id: Uuid,
        driver_id: Uuid,
        pickup_lon: f64,
        pickup_lat: f64,
        match_latency_ms: i64,
    ) -> Result<bool> {
        self.gateway
            .run_txn(self.max_retries, move |conn| {
                boxed(async move {
                    let locked = sqlx::query("SELECT status FROM drivers WHERE driver_id = $1 FOR UPDATE")
                        .bind(driver_id)
                        .fetch_optional(&mut *conn)
                        .await?;

                    let Some(row) = locked else {
                        return Ok(false);
                    };
                    let status: String = row.get("status");
                    if status != DriverStatus::Available.as_str() {
                        return Ok(false);
                    }

                    sqlx::query(
                        r#"
                        UPDATE drivers
                        SET status = 'MATCHING', current_lon = $2, current_lat = $3, last_updated = now()
                        WHERE driver_id = $1
                        "#,
                    )
                    .bind(driver_id)
                    .bind(pickup_lon)
                    .bind(pickup_lat)
                    .execute(&mut *conn)
                    .await?;

                    let result = sqlx::query(
                        r#"
                        UPDATE rides
                        SET status = 'ASSIGNED', assigned_driver = $2, assigned_at = now(), match_latency_ms = $3, retries = 0
                        WHERE ride_id = $1 AND status = 'REQUESTED'
                        "#,
                    )
                    .bind(ride_id)
                    .bind(driver_id)
                    .bind(match_latency_ms)
                    .execute(&mut *conn)
                    .await?;

                    Ok(result.rows_affected() == 1)
                })
            })
            .await
    }

    async fn record_match_miss(&self, ride_id: Uuid) -> Result<()> {
        self.gateway
            .run_txn(self.max_retries, move |conn| {
                boxed(async move {
                    sqlx::query(
                        r#"
                        UPDATE rides
                        SET retries = retries + 1
                        WHERE ride_id = $1 AND assigned_driver IS NULL AND status = 'REQUESTED'
                        "#,
                    )
                    .bind(ride_id)
                    .execute(&mut *conn)
                    .await?;
                    Ok(())
                })
            })
            .await
    }

    async fn expire_if_unmatched(&self, ride_id: Uuid) -> Result<()> {
        self.gateway
            .run_txn(self.max_retries, move |conn| {
                boxed(async move {
                    sqlx::query(
                        r#"
                        UPDATE rides
                        SET status = 'EXPIRED'
                        WHERE ride_id = $1 AND assigned_driver IS NULL AND status = 'REQUESTED'
                        "#,
                    )
                    .bind(ride_id)
                    .execute(&mut *conn)
                    .await?;
                    Ok(())
                })
            })
            .await
    }

    async fn begin_en_route(&self, ride_id: Uuid, driver_id: Uuid) -> Result<()> {
        self.gateway
            .run_txn(self.max_retries, move |conn| {
                boxed(async move {
                    sqlx::query("UPDATE rides SET status = 'EN_ROUTE' WHERE ride_id = $1")
                        .bind(ride_id)
                        .execute(&mut *conn)
                        .await?;

                    sqlx::query(
                        "UPDATE drivers SET status = 'EN_ROUTE', last_updated = now() WHERE driver_id = $1",
                    )
                    .bind(driver_id)
                    .execute(&mut *conn)
                    .await?;
                    Ok(())
                })
            })
            .await
    }

    async fn complete(
        &self,
        ride_id: Uuid,
        driver_id: Uuid,
        dropoff_lon: f64,
        dropoff_lat: f64,
        distance_km: f64,
        fare_amount: f64,
        completed_at: DateTime<Utc>,
    ) -> Result<()> {
        self.gateway
            .run_txn(self.max_retries, move |conn| {
                boxed(async move {
                    sqlx::query(
                        r#"
                        INSERT INTO trips (ride_id, driver_id, start_time, end_time, total_amount, distance)
                        VALUES ($1, $2, $3, $3, $4, $5)
                        ON CONFLICT (ride_id) DO NOTHING
                        "#,
                    )
                    .bind(ride_id)
                    .bind(driver_id)
                    .bind(completed_at)
                    .bind(fare_amount)
                    .bind(distance_km)
                    .execute(&mut *conn)
                    .await?;

                    sqlx::query("UPDATE rides SET status = 'COMPLETED', retries = 0 WHERE ride_id = $1")
                        .bind(ride_id)
                        .execute(&mut *conn)
                        .await?;

                    sqlx::query(
                        r#"
                        UPDATE drivers
                        SET status = 'AVAILABLE', current_lon = $2, current_lat = $3, last_updated = now()
                        WHERE driver_id = $1
                        "#,
                    )
                    .bind(driver_id)
                    .bind(dropoff_lon)
                    .bind(dropoff_lat)
                    .execute(&mut *conn)
                    .await?;

                    Ok(())
                })
            })
            .await
    }

    async fn get_ride(&self, ride_id: Uuid) -> Result<Option<Ride>> {
        let row = sqlx::query(
            r#"
            SELECT ride_id, status, pickup_lon, pickup_lat, dropoff_lon, dropoff_lat,
                   requested_at, assigned_driver, assigned_at, match_latency_ms, retries
            FROM rides WHERE ride_id = $1
            "#,
        )
        .bind(ride_id)
        .fetch_optional(self.gateway.pool())
        .await
        .map_err(store_err)?;

        Ok(row.map(|row| {
            let status: String = row.get("status");
            Ride {
                ride_id: row.get("ride_id"),
                status: RideStatus::parse(&status).unwrap_or(RideStatus::Requested),
                pickup_lon: row.get("pickup_lon"),
                pickup_lat: row.get("pickup_lat"),
                dropoff_lon: row.get("dropoff_lon"),
                dropoff_lat: row.get("dropoff_lat"),
                requested_at: row.get("requested_at"),
                assigned_driver: row.get("assigned_driver"),
                assigned_at: row.get("assigned_at"),
                match_latency_ms: row.get("match_latency_ms"),
                retries: row.get("retries"),
                fare_amount: None,
            }
        }))
    }
}

#[async_trait]
impl DriverRepo for PgRepo {
    async fn non_available_driver_ids(&self) -> Result<Vec<Uuid>> {
        let rows = sqlx::query("SELECT driver_id FROM drivers WHERE status != 'AVAILABLE'")
            .fetch_all(self.gateway.pool())
            .await
            .map_err(store_err)?;
        Ok(rows.into_iter().map(|r| r.get("driver_id")).collect())
    }
}

#[async_trait]
impl SeedRepo for PgRepo {
    async fn read_seeds(&self, limit: usize) -> Result<Vec<RideSeed>> {
        let rows = sqlx::query(
            r#"
            SELECT ride_id, pickup_lon, pickup_lat, dropoff_lon, dropoff_lat,
                   trip_distance, dropoff_datetime - pickup_datetime AS duration, total_amount
            FROM nyc_clean
            ORDER BY pickup_datetime
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(self.gateway.pool())
        .await
        .map_err(store_err)?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let duration: chrono::Duration = row.get("duration");
                RideSeed {
                    ride_id: row.get("ride_id"),
                    pickup_lon: row.get("pickup_lon"),
                    pickup_lat: row.get("pickup_lat"),
                    dropoff_lon: row.get("dropoff_lon"),
                    dropoff_lat: row.get("dropoff_lat"),
                    trip_distance_km: row.get("trip_distance"),
                    trip_duration_sec: duration.num_milliseconds() as f64 / 1000.0,
                    fare_amount: row.get("total_amount"),
                }
            })
            .collect())
    }
}

#[async_trait]
impl MetricsRepo for PgRepo {
    async fn status_counts(&self) -> Result<Vec<(String, i64)>> {
        let rows = sqlx::query("SELECT status, count(*) AS n FROM rides GROUP BY status")
            .fetch_all(self.gateway.pool())
            .await
            .map_err(store_err)?;
        Ok(rows
            .into_iter()
            .map(|r| (r.get("status"), r.get("n")))
            .collect())
    }

    async fn completed_count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT count(*) AS n FROM rides WHERE status = 'COMPLETED'")
            .fetch_one(self.gateway.pool())
            .await
            .map_err(store_err)?;
        Ok(row.get("n"))
    }

    async fn avg_match_latency_ms(&self) -> Result<Option<f64>> {
        let row = sqlx::query("SELECT avg(match_latency_ms) AS avg FROM rides WHERE match_latency_ms IS NOT NULL")
            .fetch_one(self.gateway.pool())
            .await
            .map_err(store_err)?;
        Ok(row.get("avg"))
    }

    async fn total_retries(&self) -> Result<i64> {
        let row = sqlx::query("SELECT coalesce(sum(retries), 0) AS n FROM rides")
            .fetch_one(self.gateway.pool())
            .await
            .map_err(store_err)?;
        Ok(row.get("n"))
    }

    async fn driver_status_histogram(&self) -> Result<Vec<(String, i64)>> {
        let rows = sqlx::query("SELECT status, count(*) AS n FROM drivers GROUP BY status")
            .fetch_all(self.gateway.pool())
            .await
            .map_err(store_err)?;
        Ok(rows
            .into_iter()
            .map(|r| (r.get("status"), r.get("n")))
            .collect())
    }

    async fn recent_drivers(&self, limit: i64) -> Result<Vec<Driver>> {
        let rows = sqlx::query(
            "SELECT driver_id, status, current_lon, current_lat FROM drivers ORDER BY last_updated DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(self.gateway.pool())
        .await
        .map_err(store_err)?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let status: String = row.get("status");
                Driver {
                    driver_id: row.get("driver_id"),
                    status: DriverStatus::parse(&status).unwrap_or(DriverStatus::Available),
                    lon: row.get("current_lon"),
                    lat: row.get("current_lat"),
                }
            })
            .collect())
    }

    async fn recent_rides(&self, limit: i64) -> Result<Vec<Ride>> {
        let rows = sqlx::query(
            r#"
            SELECT ride_id, status, pickup_lon, pickup_lat, dropoff_lon, dropoff_lat,
                   requested_at, assigned_driver, assigned_at, match_latency_ms, retries
            FROM rides ORDER BY requested_at DESC LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(self.gateway.pool())
        .await
        .map_err(store_err)?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let status: String = row.get("status");
                Ride {
                    ride_id: row.get("ride_id"),
                    status: RideStatus::parse(&status).unwrap_or(RideStatus::Requested),
                    pickup_lon: row.get("pickup_lon"),
                    pickup_lat: row.get("pickup_lat"),
                    dropoff_lon: row.get("dropoff_lon"),
                    dropoff_lat: row.get("dropoff_lat"),
                    requested_at: row.get("requested_at"),
                    assigned_driver: row.get("assigned_driver"),
                    assigned_at: row.get("assigned_at"),
                    match_latency_ms: row.get("match_latency_ms"),
                    retries: row.get("retries"),
                    fare_amount: None,
                }
            })
            .collect())
    }

    async fn recent_trips(&self, limit: i64) -> Result<Vec<TripRecord>> {
        let rows = sqlx::query(
            "SELECT ride_id, driver_id, distance, total_amount, end_time FROM trips ORDER BY end_time DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(self.gateway.pool())
        .await
        .map_err(store_err)?;

        Ok(rows
            .into_iter()
            .map(|row| TripRecord {
                ride_id: row.get("ride_id"),
                driver_id: row.get("driver_id"),
                distance_km: row.get("distance"),
                fare_amount: row.get("total_amount"),
                completed_at: row.get("end_time"),
            })
            .collect())
    }
}
