//! DDL migrations, run at startup. Mirrors the teacher's
//! `db::schema::migrate`: a sequence of `CREATE TABLE IF NOT EXISTS`
//! statements executed directly against the pool.

use sqlx::PgPool;

pub async fn migrate(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS drivers (
            driver_id UUID PRIMARY KEY,
            name TEXT NOT NULL,
            current_lon DOUBLE PRECISION NOT NULL,
            current_lat DOUBLE PRECISION NOT NULL,
            status TEXT NOT NULL DEFAULT 'AVAILABLE',
            region INT NOT NULL DEFAULT 0,
            last_updated TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_drivers_status ON drivers (status)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_drivers_region ON drivers (region)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS rides (
            ride_id UUID PRIMARY KEY,
            requested_at TIMESTAMPTZ NOT NULL,
            pickup_lon DOUBLE PRECISION NOT NULL,
            pickup_lat DOUBLE PRECISION NOT NULL,
            dropoff_lon DOUBLE PRECISION NOT NULL,
            dropoff_lat DOUBLE PRECISION NOT NULL,
            passenger_count INT NOT NULL DEFAULT 1,
            region INT NOT NULL DEFAULT 0,
            assigned_driver UUID REFERENCES drivers (driver_id),
            assigned_at TIMESTAMPTZ,
            status TEXT NOT NULL DEFAULT 'REQUESTED',
            match_latency_ms BIGINT,
            retries INT NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_rides_status ON rides (status)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_rides_requested_at ON rides (requested_at)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS trips (
            ride_id UUID PRIMARY KEY REFERENCES rides (ride_id),
            driver_id UUID NOT NULL REFERENCES drivers (driver_id),
            start_time TIMESTAMPTZ NOT NULL,
            end_time TIMESTAMPTZ NOT NULL,
            total_amount DOUBLE PRECISION NOT NULL,
            distance DOUBLE PRECISION NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS staging_nyc_raw (
            id BIGSERIAL PRIMARY KEY,
            vendor_id INT,
            pickup_datetime TIMESTAMPTZ,
            dropoff_datetime TIMESTAMPTZ,
            passenger_count INT,
            trip_distance DOUBLE PRECISION,
            pickup_lon DOUBLE PRECISION,
            pickup_lat DOUBLE PRECISION,
            dropoff_lon DOUBLE PRECISION,
            dropoff_lat DOUBLE PRECISION,
            total_amount DOUBLE PRECISION
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS nyc_clean (
            ride_id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            pickup_datetime TIMESTAMPTZ NOT NULL,
            dropoff_datetime TIMESTAMPTZ NOT NULL,
            passenger_count INT NOT NULL,
            trip_distance DOUBLE PRECISION NOT NULL,
            pickup_lon DOUBLE PRECISION NOT NULL,
            pickup_lat DOUBLE PRECISION NOT NULL,
            dropoff_lon DOUBLE PRECISION NOT NULL,
            dropoff_lat DOUBLE PRECISION NOT NULL,
            total_amount DOUBLE PRECISION NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_nyc_clean_pickup ON nyc_clean (pickup_datetime)")
        .execute(pool)
        .await?;

    Ok(())
}
