//! The busy-set cache (C3): a process-external set of driver IDs currently
//! held for a ride, used as a cheap pre-filter in front of the row lock in
//! the matcher's transaction.

mod memory;
mod redis;

pub use memory::InMemoryBusySet;
pub use redis::RedisBusySet;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;

#[async_trait]
pub trait BusySet: Send + Sync {
    /// Atomically inserts `driver_id`. Returns `true` iff it was not already
    /// present — the single source of mutual exclusion before any database
    /// work begins.
    async fn try_acquire(&self, driver_id: Uuid) -> Result<bool>;

    /// Removes `driver_id`. Idempotent: a no-op if absent.
    async fn release(&self, driver_id: Uuid) -> Result<()>;

    /// Snapshot of current holders, for candidate-exclusion filtering only;
    /// non-atomic with subsequent acquires.
    async fn members(&self) -> Result<Vec<Uuid>>;

    /// Clears the set and rewrites it from an authoritative store query.
    /// Used at startup to reconcile against a prior crashed process.
    async fn reset_to(&self, db_busy_ids: &[Uuid]) -> Result<()>;
}
