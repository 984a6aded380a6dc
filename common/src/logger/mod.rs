mod init;
mod macros;
mod trace_id;

pub use init::init_logger;
pub use macros::{child_span, root_span};
pub use trace_id::TraceId;

use std::time::Duration;

/// Runs `fut`, logging a structured warning if it took longer than `max`.
///
/// Timing alone never affects control flow; it's observability only.
pub async fn warn_if_slow<F, T>(label: &'static str, max: Duration, fut: F) -> T
where
    F: std::future::Future<Output = T>,
{
    let start = std::time::Instant::now();
    let out = fut.await;
    let elapsed = start.elapsed();
    if elapsed > max {
        tracing::warn!(
            target: "performance",
            label,
            elapsed_ms = elapsed.as_millis() as u64,
            "slow operation detected"
        );
    }
    out
}
