use chrono::{DateTime, Utc};

/// Current wall-clock time. Centralized so tests can see where "now" enters
/// the system, mirroring the teacher's `time::now_ms`.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
