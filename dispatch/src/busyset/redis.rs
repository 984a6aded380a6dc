use async_trait::async_trait;
use deadpool_redis::{redis::AsyncCommands, Pool};
use uuid::Uuid;

use super::BusySet;
use crate::error::{DispatchError, Result};

const BUSY_KEY: &str = "busy_drivers";

/// Production busy-set, a Redis set keyed by `busy_drivers`. Matches
/// `init_drivers.py`'s `BUSY_KEY` naming.
pub struct RedisBusySet {
    pool: Pool,
}

impl RedisBusySet {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BusySet for RedisBusySet {
    async fn try_acquire(&self, driver_id: Uuid) -> Result<bool> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| DispatchError::BusySetUnavailable(e.into()))?;

        let added: i64 = conn
            .sadd(BUSY_KEY, driver_id.to_string())
            .await
            .map_err(|e| DispatchError::BusySetUnavailable(e.into()))?;

        Ok(added == 1)
    }

    async fn release(&self, driver_id: Uuid) -> Result<()> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| DispatchError::BusySetUnavailable(e.into()))?;

        let _: i64 = conn
            .srem(BUSY_KEY, driver_id.to_string())
            .await
            .map_err(|e| DispatchError::BusySetUnavailable(e.into()))?;

        Ok(())
    }

    async fn members(&self) -> Result<Vec<Uuid>> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| DispatchError::BusySetUnavailable(e.into()))?;

        let raw: Vec<String> = conn
            .smembers(BUSY_KEY)
            .await
            .map_err(|e| DispatchError::BusySetUnavailable(e.into()))?;

        Ok(raw.iter().filter_map(|s| Uuid::parse_str(s).ok()).collect())
    }

    async fn reset_to(&self, db_busy_ids: &[Uuid]) -> Result<()> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| DispatchError::BusySetUnavailable(e.into()))?;

        let _: () = conn
            .del(BUSY_KEY)
            .await
            .map_err(|e| DispatchError::BusySetUnavailable(e.into()))?;

        if db_busy_ids.is_empty() {
            return Ok(());
        }

        let ids: Vec<String> = db_busy_ids.iter().map(|id| id.to_string()).collect();
        let _: i64 = conn
            .sadd(BUSY_KEY, ids)
            .await
            .map_err(|e| DispatchError::BusySetUnavailable(e.into()))?;

        Ok(())
    }
}
