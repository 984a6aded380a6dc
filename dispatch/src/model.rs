//! Domain types shared across the matcher, worker, replay scheduler, and
//! metrics reader.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a ride, per the dispatch state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RideStatus {
    Requested,
    Assigned,
    EnRoute,
    Completed,
    Expired,
}

impl RideStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RideStatus::Requested => "REQUESTED",
            RideStatus::Assigned => "ASSIGNED",
            RideStatus::EnRoute => "EN_ROUTE",
            RideStatus::Completed => "COMPLETED",
            RideStatus::Expired => "EXPIRED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "REQUESTED" => Some(RideStatus::Requested),
            "ASSIGNED" => Some(RideStatus::Assigned),
            "EN_ROUTE" => Some(RideStatus::EnRoute),
            "COMPLETED" => Some(RideStatus::Completed),
            "EXPIRED" => Some(RideStatus::Expired),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriverStatus {
    Available,
    Matching,
    EnRoute,
}

impl DriverStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DriverStatus::Available => "AVAILABLE",
            DriverStatus::Matching => "MATCHING",
            DriverStatus::EnRoute => "EN_ROUTE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "AVAILABLE" => Some(DriverStatus::Available),
            "MATCHING" => Some(DriverStatus::Matching),
            "EN_ROUTE" => Some(DriverStatus::EnRoute),
            _ => None,
        }
    }
}

/// A seed record replayed from historical trip data, used to originate a
/// ride and to play back its eventual dropoff/fare once completed.
#[derive(Debug, Clone)]
pub struct RideSeed {
    pub ride_id: Uuid,
    pub pickup_lon: f64,
    pub pickup_lat: f64,
    pub dropoff_lon: f64,
    pub dropoff_lat: f64,
    pub trip_distance_km: f64,
    pub trip_duration_sec: f64,
    pub fare_amount: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Ride {
    pub ride_id: Uuid,
    pub status: RideStatus,
    pub pickup_lon: f64,
    pub pickup_lat: f64,
    pub dropoff_lon: f64,
    pub dropoff_lat: f64,
    pub requested_at: DateTime<Utc>,
    pub assigned_driver: Option<Uuid>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub match_latency_ms: Option<i64>,
    pub retries: i32,
    pub fare_amount: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Driver {
    pub driver_id: Uuid,
    pub status: DriverStatus,
    pub lon: f64,
    pub lat: f64,
}

/// A ranked candidate produced by the matcher for a single ride.
#[derive(Debug, Clone)]
pub struct DriverCandidate {
    pub driver_id: Uuid,
    pub distance_km: f64,
}

#[derive(Debug, Clone)]
pub struct TripRecord {
    pub ride_id: Uuid,
    pub driver_id: Uuid,
    pub distance_km: f64,
    pub fare_amount: f64,
    pub completed_at: DateTime<Utc>,
}

/// Computes the fare for a completed trip. Grounded in the original
/// `calculate_fare`: a flat base plus a per-kilometer rate.
pub fn calculate_fare(distance_km: f64) -> f64 {
    ((3.0 + distance_km * 1.8) * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        for s in [
            RideStatus::Requested,
            RideStatus::Assigned,
            RideStatus::EnRoute,
            RideStatus::Completed,
            RideStatus::Expired,
        ] {
            assert_eq!(RideStatus::parse(s.as_str()), Some(s));
        }
    }

    #[test]
    fn driver_status_round_trips_through_strings() {
        for s in [
            DriverStatus::Available,
            DriverStatus::Matching,
            DriverStatus::EnRoute,
        ] {
            assert_eq!(DriverStatus::parse(s.as_str()), Some(s));
        }
    }

    #[test]
    fn fare_matches_known_value() {
        assert_eq!(calculate_fare(0.0), 3.0);
        assert_eq!(calculate_fare(1.0), 4.8);
    }
}
