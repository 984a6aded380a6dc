//! The store gateway (C2): connection acquisition plus a serializable
//! transaction harness with bounded retries and exponential backoff+jitter.

pub mod counters;
pub mod pg_repo;
pub mod schema;

pub use counters::GatewayCounters;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use futures::future::BoxFuture;
use rand::Rng;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool};

use crate::error::{DispatchError, Result};

/// Postgres/CockroachDB-specific serialization_failure SQLSTATE.
const SERIALIZATION_FAILURE: &str = "40001";

#[derive(Clone)]
pub struct Gateway {
    pool: PgPool,
    counters: GatewayCounters,
}

impl Gateway {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(32)
            .connect(database_url)
            .await?;

        Ok(Self {
            pool,
            counters: GatewayCounters::new(),
        })
    }

    pub fn counters(&self) -> &GatewayCounters {
        &self.counters
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        schema::migrate(&self.pool).await
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs `f` inside a `SERIALIZABLE` transaction, retrying on SQLSTATE
    /// `40001` with backoff `100ms * 2^attempt + U(0, 50ms)`, up to
    /// `max_retries` attempts total. `attempt` starts at 0. `f` must be
    /// idempotent under retry: it is called again with a fresh connection on
    /// every retryable failure.
    pub async fn run_txn<T, F>(&self, max_retries: u32, mut f: F) -> Result<T>
    where
        F: for<'c> FnMut(&'c mut PgConnection) -> BoxFuture<'c, anyhow::Result<T>> + Send,
        T: Send,
    {
        let mut attempt = 0u32;

        loop {
            let mut txn = self
                .pool
                .begin()
                .await
                .map_err(|e| DispatchError::StoreUnavailable(e.into()))?;

            sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
                .execute(&mut *txn)
                .await
                .map_err(|e| DispatchError::StoreUnavailable(e.into()))?;

            match f(&mut txn).await {
                Ok(value) => {
                    txn.commit()
                        .await
                        .map_err(|e| DispatchError::StoreUnavailable(e.into()))?;
                    self.counters.record_success(attempt);
                    return Ok(value);
                }
                Err(cause) => {
                    let _ = txn.rollback().await;

                    if is_retryable(&cause) && attempt < max_retries {
                        self.counters.record_conflict(attempt);
                        let delay = backoff_delay(attempt);
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }

                    self.counters.record_exhausted();
                    return Err(DispatchError::TransactionFailed {
                        cause,
                        attempts: attempt + 1,
                    });
                }
            }
        }
    }
}

fn is_retryable(err: &anyhow::Error) -> bool {
    err.downcast_ref::<sqlx::Error>()
        .and_then(|e| match e {
            sqlx::Error::Database(db) => db.code(),
            _ => None,
        })
        .map(|code| code == SERIALIZATION_FAILURE)
        .unwrap_or(false)
}

fn backoff_delay(attempt: u32) -> Duration {
    let base_ms = 100u64.saturating_mul(1u64 << attempt.min(20));
    let jitter_ms = rand::rng().random_range(0..=50);
    Duration::from_millis(base_ms + jitter_ms)
}

/// Boxes an async block as the `BoxFuture` shape `run_txn` expects.
pub fn boxed<'c, T, Fut>(fut: Fut) -> Pin<Box<dyn Future<Output = anyhow::Result<T>> + Send + 'c>>
where
    Fut: Future<Output = anyhow::Result<T>> + Send + 'c,
{
    Box::pin(fut)
}
