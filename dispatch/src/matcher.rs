//! The nearest-driver matcher (C4): candidate selection, proximity ranking,
//! atomic acquisition of exactly one driver, serializable state-update
//! transaction.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::instrument;
use uuid::Uuid;

use crate::busyset::BusySet;
use crate::geo::region;
use crate::repo::{rank_candidates, RideStore};

const MAX_CANDIDATE_SCAN: usize = 50;

pub struct Matcher<S, B> {
    store: Arc<S>,
    busy_set: Arc<B>,
    max_nearest_drivers: usize,
}

impl<S, B> Matcher<S, B>
where
    S: RideStore,
    B: BusySet,
{
    pub fn new(store: Arc<S>, busy_set: Arc<B>, max_nearest_drivers: usize) -> Self {
        Self {
            store,
            busy_set,
            max_nearest_drivers,
        }
    }

    /// Attempts to match `ride_id` to a driver. Returns the acquired driver
    /// ID, or `None` if no candidate could be assigned this attempt.
    /// `t0` is the start of the *whole* match loop (for `match_latency_ms`),
    /// not of this single attempt.
    #[instrument(skip(self), fields(ride_id = %ride_id))]
    pub async fn match_ride(
        &self,
        ride_id: Uuid,
        pickup_lon: f64,
        pickup_lat: f64,
        t0: chrono::DateTime<chrono::Utc>,
    ) -> crate::error::Result<Option<Uuid>> {
        let pre_delay = Duration::from_millis(rand::rng().random_range(100..=300));
        tokio::time::sleep(pre_delay).await;

        let busy = self.busy_set.members().await?;
        let region_id = region(Some(pickup_lon), Some(pickup_lat));

        let candidates = self
            .store
            .candidate_drivers(Some(region_id), &busy, MAX_CANDIDATE_SCAN)
            .await?;

        if candidates.is_empty() {
            return Ok(None);
        }

        let ranked = rank_candidates(&candidates, pickup_lon, pickup_lat, self.max_nearest_drivers);

        for candidate in ranked {
            if !self.busy_set.try_acquire(candidate.driver_id).await? {
                continue;
            }

            let match_latency_ms = (crate::time::now() - t0).num_milliseconds().max(0);

            let assigned = self
                .store
                .try_assign(
                    ride_id,
                    candidate.driver_id,
                    pickup_lon,
                    pickup_lat,
                    match_latency_ms,
                )
                .await;

            match assigned {
                Ok(true) => return Ok(Some(candidate.driver_id)),
                Ok(false) => {
                    // Driver lost the race (no longer AVAILABLE) or the ride
                    // was no longer REQUESTED. Release and try the next
                    // candidate.
                    self.busy_set.release(candidate.driver_id).await?;
                    continue;
                }
                Err(e) => {
                    self.busy_set.release(candidate.driver_id).await?;
                    return Err(e);
                }
            }
        }

        Ok(None)
    }
}
