//! Synthetic trip generator into `staging_nyc_raw`. Mirrors `loader.py`'s
//! `generate_series`-driven synthesis; the random distributions are
//! generated Rust-side and inserted via `sqlx`, since `generate_series`
//! itself is left to the database as a set-returning builtin.

use chrono::{Duration, TimeZone, Utc};
use rand::Rng;
use sqlx::PgPool;
use tracing::info;

pub async fn load_synthetic(pool: &PgPool, n_rows: u32) -> anyhow::Result<()> {
    info!(n_rows, "inserting synthetic rows into staging_nyc_raw");

    let epoch_start = Utc.with_ymd_and_hms(2015, 1, 1, 0, 0, 0).unwrap();
    let mut rng = rand::rng();

    for _ in 0..n_rows {
        let vendor_id = 1 + rng.random_range(0..3);
        let pickup_offset_days: f64 = rng.random_range(0.0..31.0);
        let pickup_datetime = epoch_start + Duration::seconds((pickup_offset_days * 86_400.0) as i64);

        let trip_minutes = 5.0 + rng.random_range(0.0..45.0);
        let dropoff_datetime = pickup_datetime + Duration::seconds((trip_minutes * 60.0) as i64);

        let passenger_count = 1 + rng.random_range(0..4);
        let distance = 0.5 + rng.random_range(0.0..19.5);

        let pickup_lon = -74.05 + rng.random_range(0.0..0.3);
        let pickup_lat = 40.63 + rng.random_range(0.0..0.22);
        let dropoff_lon = pickup_lon + (rng.random::<f64>() - 0.5) * 0.05;
        let dropoff_lat = pickup_lat + (rng.random::<f64>() - 0.5) * 0.05;

        let total_amount =
            2.5 + distance * (1.5 + rng.random_range(0.0..1.0)) + rng.random_range(0.0..3.0);

        sqlx::query(
            r#"
            INSERT INTO staging_nyc_raw (
                vendor_id, pickup_datetime, dropoff_datetime, passenger_count,
                trip_distance, pickup_lon, pickup_lat, dropoff_lon, dropoff_lat, total_amount
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(vendor_id)
        .bind(pickup_datetime)
        .bind(dropoff_datetime)
        .bind(passenger_count)
        .bind(distance)
        .bind(pickup_lon)
        .bind(pickup_lat)
        .bind(dropoff_lon)
        .bind(dropoff_lat)
        .bind(total_amount)
        .execute(pool)
        .await?;
    }

    info!("staging_nyc_raw load complete");
    Ok(())
}
