//! Seeds N drivers distributed across the NYC metro bounding box. Mirrors
//! `init_drivers.py`'s bounds and jitter, and clears the busy-set cache on
//! `clear_existing` the same way the Python version clears its Redis key.

use rand::Rng;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::busyset::BusySet;
use crate::geo::region;

const NYC_MIN_LON: f64 = -74.25;
const NYC_MAX_LON: f64 = -73.75;
const NYC_MIN_LAT: f64 = 40.40;
const NYC_MAX_LAT: f64 = 40.80;

pub async fn init_drivers(
    pool: &PgPool,
    busy_set: &dyn BusySet,
    n: u32,
    clear_existing: bool,
) -> anyhow::Result<()> {
    info!(n, clear_existing, "initializing drivers");

    if clear_existing {
        sqlx::query("DELETE FROM drivers").execute(pool).await?;
        busy_set.reset_to(&[]).await?;
    }

    let mut rng = rand::rng();
    for i in 0..n {
        let mut lon = NYC_MIN_LON + rng.random::<f64>() * (NYC_MAX_LON - NYC_MIN_LON);
        let mut lat = NYC_MIN_LAT + rng.random::<f64>() * (NYC_MAX_LAT - NYC_MIN_LAT);
        lon += (rng.random::<f64>() - 0.5) * 0.02;
        lat += (rng.random::<f64>() - 0.5) * 0.02;

        let region_id = region(Some(lon), Some(lat));

        sqlx::query(
            r#"
            INSERT INTO drivers (driver_id, name, current_lon, current_lat, status, region, last_updated)
            VALUES ($1, $2, $3, $4, 'AVAILABLE', $5, now())
            ON CONFLICT (driver_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(format!("Driver_{}", i + 1))
        .bind(lon)
        .bind(lat)
        .bind(region_id)
        .execute(pool)
        .await?;
    }

    info!("driver seeding complete");
    Ok(())
}
