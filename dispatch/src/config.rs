/// Runtime configuration for the dispatch engine.
///
/// Follows the teacher's `AppConfig::from_env()` shape: env vars with sane,
/// hard-coded defaults matching the recognized options in spec §6.
#[derive(Clone, Debug)]
pub struct DispatchConfig {
    /// Postgres/CockroachDB connection string.
    pub database_url: String,

    /// Redis connection string backing the busy-set cache and the metrics
    /// throughput baseline.
    pub redis_url: String,

    // =========================
    // Replay scheduler (C6)
    // =========================
    /// Worker pool size for the replay scheduler.
    pub max_concurrency: usize,

    // =========================
    // Ride lifecycle worker (C5)
    // =========================
    /// Match-loop timeout, in seconds, before a ride expires.
    pub max_wait_seconds: u64,

    /// Divisor applied to a seed ride's real trip duration to get the
    /// simulated EN_ROUTE sleep.
    pub simulation_speedup: f64,

    /// Floor for the simulated EN_ROUTE duration, in seconds.
    pub min_sim_duration_sec: f64,

    // =========================
    // Matcher (C4)
    // =========================
    /// Top-K nearest candidates kept after ranking by distance.
    pub max_nearest_drivers: usize,

    // =========================
    // Store gateway (C2)
    // =========================
    /// `run_txn` retry cap on serializable-conflict errors.
    pub max_retries: u32,
}

impl DispatchConfig {
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/ridedispatch".to_string());
        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".to_string());

        Self {
            database_url,
            redis_url,

            max_concurrency: env_usize("MAX_CONCURRENCY", 200),
            max_wait_seconds: env_u64("MAX_WAIT_SECONDS", 300),
            simulation_speedup: env_f64("SIMULATION_SPEEDUP", 30.0),
            min_sim_duration_sec: env_f64("MIN_SIM_DURATION_SEC", 2.0),
            max_nearest_drivers: env_usize("MAX_NEAREST_DRIVERS", 5),
            max_retries: env_u64("RUN_TXN_MAX_RETRIES", 5) as u32,
        }
    }
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
