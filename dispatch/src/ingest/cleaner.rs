//! Filters `staging_nyc_raw` into `nyc_clean`. Mirrors `cleaner.py`'s
//! thresholds verbatim: minimum trip distance and fare, and a pickup
//! bounding box around the NYC metro area.

use sqlx::PgPool;
use tracing::info;

pub async fn clean_data(pool: &PgPool) -> anyhow::Result<u64> {
    info!("cleaning staging_nyc_raw into nyc_clean");

    let result = sqlx::query(
        r#"
        INSERT INTO nyc_clean (
            pickup_datetime, dropoff_datetime, passenger_count, trip_distance,
            pickup_lon, pickup_lat, dropoff_lon, dropoff_lat, total_amount
        )
        SELECT
            pickup_datetime, dropoff_datetime, passenger_count, trip_distance,
            pickup_lon, pickup_lat, dropoff_lon, dropoff_lat, total_amount
        FROM staging_nyc_raw
        WHERE trip_distance > 0.5
          AND total_amount > 3.0
          AND pickup_lon BETWEEN -74.3 AND -73.5
          AND pickup_lat BETWEEN 40.3 AND 41.0
        "#,
    )
    .execute(pool)
    .await?;

    info!(rows = result.rows_affected(), "clean complete");
    Ok(result.rows_affected())
}
