use async_trait::async_trait;
use dashmap::DashSet;
use uuid::Uuid;

use super::BusySet;
use crate::error::Result;

/// Single-process busy-set backed by `dashmap`, used in tests and as a
/// single-binary fallback when no Redis is configured.
#[derive(Default)]
pub struct InMemoryBusySet {
    held: DashSet<Uuid>,
}

impl InMemoryBusySet {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BusySet for InMemoryBusySet {
    async fn try_acquire(&self, driver_id: Uuid) -> Result<bool> {
        Ok(self.held.insert(driver_id))
    }

    async fn release(&self, driver_id: Uuid) -> Result<()> {
        self.held.remove(&driver_id);
        Ok(())
    }

    async fn members(&self) -> Result<Vec<Uuid>> {
        Ok(self.held.iter().map(|e| *e).collect())
    }

    async fn reset_to(&self, db_busy_ids: &[Uuid]) -> Result<()> {
        self.held.clear();
        for id in db_busy_ids {
            self.held.insert(*id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn try_acquire_then_release_then_acquire_again() {
        let set = InMemoryBusySet::new();
        let d = Uuid::new_v4();

        assert!(set.try_acquire(d).await.unwrap());
        assert!(!set.try_acquire(d).await.unwrap());

        set.release(d).await.unwrap();
        assert!(set.try_acquire(d).await.unwrap());
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        let set = InMemoryBusySet::new();
        let d = Uuid::new_v4();
        set.release(d).await.unwrap();
        set.release(d).await.unwrap();
        assert!(set.try_acquire(d).await.unwrap());
    }

    #[tokio::test]
    async fn reset_to_replaces_membership() {
        let set = InMemoryBusySet::new();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        set.try_acquire(a).await.unwrap();

        set.reset_to(&[b, c]).await.unwrap();

        let members = set.members().await.unwrap();
        assert!(!members.contains(&a));
        assert!(members.contains(&b));
        assert!(members.contains(&c));
    }
}
