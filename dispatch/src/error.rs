use thiserror::Error;

/// Behavioral error classes named in the dispatch engine's design (§7).
///
/// Each variant carries enough context to log structurally; callers match on
/// variant, not on string content.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// `run_txn` exhausted its retry budget or hit a non-retryable DB error.
    #[error("transaction failed after {attempts} attempt(s): {cause}")]
    TransactionFailed {
        cause: anyhow::Error,
        attempts: u32,
    },

    /// A matcher acquired a driver in the busy-set but the row was no longer
    /// AVAILABLE by the time the transaction ran.
    #[error("driver {driver_id} lost the race for ride {ride_id}")]
    DriverLostRace { ride_id: String, driver_id: String },

    /// The match loop exceeded `MAX_WAIT_SECONDS` without an assignment.
    #[error("ride {0} timed out waiting for a match")]
    MatchTimeout(String),

    /// The backing store is unreachable or returned a non-retryable error.
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[source] anyhow::Error),

    /// The busy-set cache is unreachable. Callers should treat `try_acquire`
    /// as a failure to acquire, not as a crash.
    #[error("busy-set cache unavailable: {0}")]
    BusySetUnavailable(#[source] anyhow::Error),

    /// An uncaught error inside a ride worker.
    #[error("ride worker failed for {ride_id}: {cause}")]
    WorkerFailure {
        ride_id: String,
        cause: anyhow::Error,
    },
}

pub type Result<T> = std::result::Result<T, DispatchError>;
