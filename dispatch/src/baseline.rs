//! Redis-backed `MetricsBaseline` (C7). Shares the busy-set's Redis
//! connection pool but writes under distinct keys, matching §6's framing
//! of the metrics baseline store as "any key/value store".

use async_trait::async_trait;
use deadpool_redis::{redis::AsyncCommands, Pool};

use crate::error::{DispatchError, Result};
use crate::repo::MetricsBaseline;

pub struct RedisMetricsBaseline {
    pool: Pool,
}

impl RedisMetricsBaseline {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MetricsBaseline for RedisMetricsBaseline {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| DispatchError::StoreUnavailable(e.into()))?;
        conn.get(key)
            .await
            .map_err(|e| DispatchError::StoreUnavailable(e.into()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| DispatchError::StoreUnavailable(e.into()))?;
        let _: () = conn
            .set(key, value)
            .await
            .map_err(|e| DispatchError::StoreUnavailable(e.into()))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| DispatchError::StoreUnavailable(e.into()))?;
        let _: () = conn
            .del(key)
            .await
            .map_err(|e| DispatchError::StoreUnavailable(e.into()))?;
        Ok(())
    }
}
