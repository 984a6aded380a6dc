mod cli;

use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use cli::{Cli, Command};
use common::logger::init_logger;
use dispatch::api::{self, ApiState};
use dispatch::baseline::RedisMetricsBaseline;
use dispatch::busyset::{BusySet, RedisBusySet};
use dispatch::config::DispatchConfig;
use dispatch::ingest;
use dispatch::matcher::Matcher;
use dispatch::metrics::MetricsReader;
use dispatch::repo::DriverRepo;
use dispatch::replay::ReplayScheduler;
use dispatch::store::pg_repo::PgRepo;
use dispatch::store::Gateway;
use dispatch::worker::WorkerConfig;

async fn connect_redis(redis_url: &str) -> anyhow::Result<deadpool_redis::Pool> {
    let cfg = deadpool_redis::Config::from_url(redis_url);
    Ok(cfg.create_pool(Some(deadpool_redis::Runtime::Tokio1))?)
}

/// Reconciles the busy-set cache against the authoritative store, discarding
/// stale entries left behind by a prior crashed process (§5).
async fn reconcile_busy_set(store: &PgRepo, busy_set: &dyn BusySet) -> anyhow::Result<()> {
    let busy_ids = store.non_available_driver_ids().await?;
    busy_set.reset_to(&busy_ids).await?;
    tracing::info!(count = busy_ids.len(), "busy-set reconciled from store");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let is_production = std::env::var("APP_ENV").unwrap_or_default() == "production";
    init_logger("dispatch-cli", is_production);

    let cli = Cli::parse();
    let config = DispatchConfig::from_env();

    let gateway = Gateway::connect(&config.database_url).await?;
    gateway.migrate().await?;
    let store = Arc::new(PgRepo::with_max_retries(gateway.clone(), config.max_retries));

    let redis_pool = connect_redis(&config.redis_url).await?;
    let busy_set = Arc::new(RedisBusySet::new(redis_pool.clone()));
    reconcile_busy_set(&store, busy_set.as_ref()).await?;

    match cli.command {
        Command::Seed { rows } => {
            ingest::loader::load_synthetic(gateway.pool(), rows).await?;
        }
        Command::Clean => {
            ingest::cleaner::clean_data(gateway.pool()).await?;
        }
        Command::InitDrivers {
            count,
            clear_existing,
        } => {
            ingest::drivers::init_drivers(gateway.pool(), busy_set.as_ref(), count, clear_existing)
                .await?;
        }
        Command::Replay { limit, serve } => {
            let matcher = Arc::new(Matcher::new(
                store.clone(),
                busy_set.clone(),
                config.max_nearest_drivers,
            ));
            let worker_config = Arc::new(WorkerConfig {
                max_wait_seconds: config.max_wait_seconds,
                simulation_speedup: config.simulation_speedup,
                min_sim_duration_sec: config.min_sim_duration_sec,
            });
            let scheduler = ReplayScheduler::new(
                store.clone(),
                store.clone(),
                busy_set.clone(),
                matcher,
                worker_config,
                config.max_concurrency,
            );

            let cancel = CancellationToken::new();
            if serve {
                spawn_api_server(gateway.clone(), redis_pool.clone());
            }

            let summary = scheduler
                .replay(limit, gateway.counters(), cancel)
                .await?;
            tracing::info!(?summary, "replay finished");
        }
        Command::All {
            rows,
            drivers,
            limit,
        } => {
            ingest::loader::load_synthetic(gateway.pool(), rows).await?;
            ingest::cleaner::clean_data(gateway.pool()).await?;
            ingest::drivers::init_drivers(gateway.pool(), busy_set.as_ref(), drivers, true).await?;
            reconcile_busy_set(&store, busy_set.as_ref()).await?;

            let matcher = Arc::new(Matcher::new(
                store.clone(),
                busy_set.clone(),
                config.max_nearest_drivers,
            ));
            let worker_config = Arc::new(WorkerConfig {
                max_wait_seconds: config.max_wait_seconds,
                simulation_speedup: config.simulation_speedup,
                min_sim_duration_sec: config.min_sim_duration_sec,
            });
            let scheduler = ReplayScheduler::new(
                store.clone(),
                store.clone(),
                busy_set.clone(),
                matcher,
                worker_config,
                config.max_concurrency,
            );

            spawn_api_server(gateway.clone(), redis_pool.clone());

            let cancel = CancellationToken::new();
            let replay_cancel = cancel.clone();
            let mut replay_handle = tokio::spawn(async move {
                scheduler.replay(limit, gateway.counters(), replay_cancel).await
            });

            loop {
                tokio::select! {
                    result = &mut replay_handle => {
                        let summary = result??;
                        tracing::info!(?summary, "replay finished");
                        break;
                    }
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("shutdown signal received, draining workers");
                        cancel.cancel();
                    }
                }
            }
        }
    }

    Ok(())
}

fn spawn_api_server(gateway: Gateway, redis_pool: deadpool_redis::Pool) {
    tokio::spawn(async move {
        let metrics_repo = PgRepo::new(gateway);
        let baseline = RedisMetricsBaseline::new(redis_pool);
        let state = Arc::new(ApiState {
            metrics: MetricsReader::new(metrics_repo, baseline),
        });

        let router = api::router(state);
        let listener = match tokio::net::TcpListener::bind("0.0.0.0:8080").await {
            Ok(l) => l,
            Err(e) => {
                tracing::error!(error = %e, "failed to bind API listener");
                return;
            }
        };

        tracing::info!("API listening on 0.0.0.0:8080");
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!(error = %e, "API server stopped");
        }
    });
}
